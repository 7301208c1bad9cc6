//! Background pollers: fetch a resource every interval, diff it against the
//! previous snapshot and push one notification per relevant change.
//!
//! A [`Monitor`] only knows how to fetch and how to describe a change. The
//! snapshot bookkeeping lives in [`PollState`] and the loop in [`run_poller`],
//! shared by every monitored resource.

pub mod channels;
pub mod forwards;
pub mod invoices;
pub mod payments;
pub mod settlements;
pub mod transactions;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    errors::Error,
    formatting::escape_html,
    outbox::{Notification, Outbox, Source},
    ports::{LightningNode, NodeConnector},
    supervisor::WorkerGroup,
    Result,
};

pub use channels::ChannelMonitor;
pub use forwards::ForwardMonitor;
pub use invoices::InvoiceMonitor;
pub use payments::PaymentMonitor;
pub use settlements::{run_settlement_watcher, SettlementDedupe};
pub use transactions::TransactionMonitor;

/// How many invoices/payments a poll cycle looks at.
pub const POLL_LIST_LIMIT: u32 = 100;

#[async_trait]
pub trait Monitor: Send + Sync {
    type Entry: Clone + Send + Sync;

    fn source(&self) -> Source;

    /// Current snapshot as `(key, entry)` pairs.
    async fn fetch(&self, node: &dyn LightningNode) -> Result<Vec<(String, Self::Entry)>>;

    /// Notification for `current`, given the entry stored under the same key
    /// last cycle (`None` when the key is new).
    fn describe(&self, previous: Option<&Self::Entry>, current: &Self::Entry) -> Option<String>;

    /// Notification for a key that was present last cycle and is gone now.
    fn vanished(&self, _previous: &Self::Entry) -> Option<String> {
        None
    }
}

pub fn error_notification(source: Source, err: &Error) -> String {
    format!(
        "⚠️ {source} monitor error: {}",
        escape_html(&err.to_string())
    )
}

/// The one snapshot a poller keeps between cycles.
pub struct PollState<E> {
    previous: Option<HashMap<String, E>>,
}

impl<E> Default for PollState<E> {
    fn default() -> Self {
        Self { previous: None }
    }
}

impl<E: Clone> PollState<E> {
    /// Fold one fetch outcome into the state and return the messages to send.
    ///
    /// A failure yields one error message and keeps the old snapshot. The first
    /// successful fetch only establishes the baseline.
    pub fn apply<M>(&mut self, monitor: &M, outcome: Result<Vec<(String, E)>>) -> Vec<String>
    where
        M: Monitor<Entry = E> + ?Sized,
    {
        let current = match outcome {
            Ok(items) => items,
            Err(e) => return vec![error_notification(monitor.source(), &e)],
        };

        let mut messages = Vec::new();
        if let Some(previous) = &self.previous {
            for (key, entry) in &current {
                if let Some(msg) = monitor.describe(previous.get(key), entry) {
                    messages.push(msg);
                }
            }
        }

        let next: HashMap<String, E> = current.into_iter().collect();
        if let Some(previous) = &self.previous {
            let mut gone: Vec<(&String, &E)> = previous
                .iter()
                .filter(|(key, _)| !next.contains_key(*key))
                .collect();
            gone.sort_by(|a, b| a.0.cmp(b.0));
            messages.extend(gone.into_iter().filter_map(|(_, e)| monitor.vanished(e)));
        }

        self.previous = Some(next);
        messages
    }
}

async fn fetch_once<M>(monitor: &M, connector: &dyn NodeConnector) -> Result<Vec<(String, M::Entry)>>
where
    M: Monitor + ?Sized,
{
    let node = connector.connect().await?;
    monitor.fetch(node.as_ref()).await
}

/// Run one poll-diff-notify loop until cancelled.
///
/// Returns an error only when the outbox is gone; fetch failures are reported
/// to the chat and retried on the next cycle.
pub async fn run_poller<M>(
    monitor: M,
    connector: Arc<dyn NodeConnector>,
    outbox: Outbox,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<()>
where
    M: Monitor,
{
    let source = monitor.source();
    tracing::info!(monitor = %source, interval_secs = interval.as_secs(), "monitor started");
    let mut state = PollState::default();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            r = fetch_once(&monitor, connector.as_ref()) => r,
        };
        match &outcome {
            Ok(items) => tracing::debug!(monitor = %source, items = items.len(), "poll ok"),
            Err(e) => tracing::warn!(monitor = %source, "poll failed: {e}"),
        }

        for html in state.apply(&monitor, outcome) {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                r = outbox.send(Notification::new(source, html)) => r?,
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(interval) => {}
        }
    }

    tracing::info!(monitor = %source, "monitor stopped");
    Ok(())
}

fn spawn_poller<M>(
    group: &mut WorkerGroup,
    monitor: M,
    connector: &Arc<dyn NodeConnector>,
    outbox: &Outbox,
    interval: Duration,
) -> Source
where
    M: Monitor + 'static,
    M::Entry: 'static,
{
    let source = monitor.source();
    let token = group.token();
    group.spawn(
        format!("{source} monitor"),
        run_poller(monitor, connector.clone(), outbox.clone(), interval, token),
    );
    source
}

/// Spawn every monitor enabled in `cfg` into `group`. Returns what was started.
pub fn spawn_enabled(
    group: &mut WorkerGroup,
    cfg: &Config,
    connector: Arc<dyn NodeConnector>,
    outbox: &Outbox,
) -> Vec<Source> {
    let toggles = cfg.monitors;
    let interval = cfg.poll_interval;
    let mut started = Vec::new();

    if toggles.channels {
        started.push(spawn_poller(group, ChannelMonitor, &connector, outbox, interval));
    }
    if toggles.invoices {
        let monitor = InvoiceMonitor::new(POLL_LIST_LIMIT);
        started.push(spawn_poller(group, monitor, &connector, outbox, interval));
    }
    if toggles.payments {
        let monitor = PaymentMonitor::new(POLL_LIST_LIMIT);
        started.push(spawn_poller(group, monitor, &connector, outbox, interval));
    }
    if toggles.transactions {
        started.push(spawn_poller(group, TransactionMonitor, &connector, outbox, interval));
    }
    if toggles.forwards {
        let monitor = ForwardMonitor::new(cfg.forwarding_window);
        started.push(spawn_poller(group, monitor, &connector, outbox, interval));
    }
    if toggles.settlements {
        let token = group.token();
        group.spawn(
            "settlement watcher",
            run_settlement_watcher(connector, outbox.clone(), cfg.resubscribe_delay, token),
        );
        started.push(Source::Settlements);
    }

    started
}
