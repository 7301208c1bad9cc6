use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, Result};

/// Typed configuration, built once at startup and shared as `Arc<Config>`.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub notify_chat_id: ChatId,
    pub telegram_allowed_users: Vec<i64>,
    pub telegram_safe_limit: usize,

    // Node
    pub lnd: LndConfig,

    // Background workers
    pub poll_interval: Duration,
    pub resubscribe_delay: Duration,
    pub monitors: MonitorToggles,
    pub notify_queue_capacity: usize,
    pub notify_min_interval: Duration,
    pub shutdown_grace: Duration,

    // Reports
    pub recent_items: usize,
    pub forwarding_window: Duration,

    // Market lookups
    pub market_api_url: String,
    pub http_timeout: Duration,
}

/// Where and how to reach the node's REST gateway.
#[derive(Clone, Debug)]
pub struct LndConfig {
    pub rest_url: String,
    pub tls_cert_path: PathBuf,
    pub macaroon_path: PathBuf,
    pub rpc_timeout: Duration,
}

/// Which background workers are started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorToggles {
    pub channels: bool,
    pub invoices: bool,
    pub payments: bool,
    pub transactions: bool,
    pub forwards: bool,
    pub settlements: bool,
}

impl Default for MonitorToggles {
    fn default() -> Self {
        // Settled invoices are covered by the subscription stream; polling them too
        // would double-notify.
        Self {
            channels: true,
            invoices: false,
            payments: true,
            transactions: true,
            forwards: true,
            settlements: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let notify_chat_id = env_str("TELEGRAM_CHAT_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(ChatId)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_CHAT_ID must be set to a numeric chat id".to_string())
            })?;

        // Private chat ids equal the owner's user id, so that is the sensible default.
        let mut telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));
        if telegram_allowed_users.is_empty() {
            telegram_allowed_users.push(notify_chat_id.0);
        }
        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000);

        // Node credentials (RaspiBlitz layout by default)
        let lnd_dir = env_path("LND_DIR").unwrap_or_else(|| PathBuf::from("/mnt/hdd/app-data/lnd"));
        let network = env_str("LND_NETWORK")
            .and_then(non_empty)
            .unwrap_or_else(|| "mainnet".to_string());
        let lnd = LndConfig {
            rest_url: env_str("LND_REST_URL")
                .and_then(non_empty)
                .unwrap_or_else(|| "https://localhost:8080".to_string()),
            tls_cert_path: env_path("LND_TLS_CERT_PATH")
                .unwrap_or_else(|| default_cert_path(&lnd_dir)),
            macaroon_path: env_path("LND_MACAROON_PATH")
                .unwrap_or_else(|| default_macaroon_path(&lnd_dir, &network)),
            rpc_timeout: Duration::from_secs(env_u64("LND_RPC_TIMEOUT_SECS").unwrap_or(30)),
        };

        // Workers
        let poll_interval =
            Duration::from_secs(env_u64("POLL_INTERVAL_SECS").unwrap_or(60).max(1));
        let resubscribe_delay =
            Duration::from_secs(env_u64("SUBSCRIBE_RETRY_SECS").unwrap_or(30).max(1));
        let defaults = MonitorToggles::default();
        let monitors = MonitorToggles {
            channels: env_bool("MONITOR_CHANNELS").unwrap_or(defaults.channels),
            invoices: env_bool("MONITOR_INVOICES").unwrap_or(defaults.invoices),
            payments: env_bool("MONITOR_PAYMENTS").unwrap_or(defaults.payments),
            transactions: env_bool("MONITOR_TRANSACTIONS").unwrap_or(defaults.transactions),
            forwards: env_bool("MONITOR_FORWARDS").unwrap_or(defaults.forwards),
            settlements: env_bool("MONITOR_SETTLEMENTS").unwrap_or(defaults.settlements),
        };
        let notify_queue_capacity = env_usize("NOTIFY_QUEUE_CAPACITY").unwrap_or(64).max(1);
        let notify_min_interval =
            Duration::from_millis(env_u64("NOTIFY_MIN_INTERVAL_MS").unwrap_or(1050));
        let shutdown_grace = Duration::from_secs(env_u64("SHUTDOWN_GRACE_SECS").unwrap_or(5));

        // Reports
        let recent_items = env_usize("REPORT_RECENT_ITEMS").unwrap_or(10).max(1);
        let forwarding_window = window_from_hours(env_u64("FORWARDING_WINDOW_HOURS").unwrap_or(24));

        // Market lookups
        let market_api_url = env_str("MARKET_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://mempool.space/api".to_string());
        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(10));

        Ok(Self {
            telegram_bot_token,
            notify_chat_id,
            telegram_allowed_users,
            telegram_safe_limit,
            lnd,
            poll_interval,
            resubscribe_delay,
            monitors,
            notify_queue_capacity,
            notify_min_interval,
            shutdown_grace,
            recent_items,
            forwarding_window,
            market_api_url,
            http_timeout,
        })
    }
}

pub fn default_cert_path(lnd_dir: &Path) -> PathBuf {
    lnd_dir.join("tls.cert")
}

pub fn default_macaroon_path(lnd_dir: &Path, network: &str) -> PathBuf {
    lnd_dir
        .join("data/chain/bitcoin")
        .join(network)
        .join("admin.macaroon")
}

/// At least one hour; absurdly large values saturate.
fn window_from_hours(hours: u64) -> Duration {
    Duration::from_secs(hours.max(1).saturating_mul(3600))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
