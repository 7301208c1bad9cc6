//! Host metrics through `sysinfo`.

use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{Disks, System};

use crate::{errors::Error, ports::HostProbe, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostMetrics {
    pub host_name: Option<String>,
    pub cpu_percent: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub disks: Vec<DiskUsage>,
    pub uptime: Duration,
    pub load_average: [f64; 3],
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub mount_point: String,
    pub used: u64,
    pub total: u64,
}

/// Samples the machine the bot runs on (usually the node host).
#[derive(Clone, Copy, Debug, Default)]
pub struct SysinfoProbe;

impl SysinfoProbe {
    fn collect() -> HostMetrics {
        let mut sys = System::new();
        // CPU usage is a delta between two refreshes.
        sys.refresh_cpu();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();
        sys.refresh_memory();

        let disks = Disks::new_with_refreshed_list()
            .list()
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| DiskUsage {
                mount_point: d.mount_point().display().to_string(),
                used: d.total_space().saturating_sub(d.available_space()),
                total: d.total_space(),
            })
            .collect();

        let load = System::load_average();

        HostMetrics {
            host_name: System::host_name(),
            cpu_percent: sys.global_cpu_info().cpu_usage(),
            memory_used: sys.used_memory(),
            memory_total: sys.total_memory(),
            disks,
            uptime: Duration::from_secs(System::uptime()),
            load_average: [load.one, load.five, load.fifteen],
        }
    }
}

#[async_trait]
impl HostProbe for SysinfoProbe {
    async fn sample(&self) -> Result<HostMetrics> {
        tokio::task::spawn_blocking(Self::collect)
            .await
            .map_err(|e| Error::External(format!("host probe failed: {e}")))
    }
}
