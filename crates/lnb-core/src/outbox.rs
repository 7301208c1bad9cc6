//! Notification hand-off from background workers to the chat.
//!
//! Every worker holds a cloned [`Outbox`]. A single delivery task drains the
//! bounded queue in FIFO order and owns the transport it sends through, so each
//! worker's notifications arrive in the order they were produced.

use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::{domain::ChatId, errors::Error, messaging::port::MessagingPort, Result};

/// Which worker produced a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    Channels,
    Invoices,
    Payments,
    Transactions,
    Forwards,
    Settlements,
    Supervisor,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Channels => "channels",
            Source::Invoices => "invoices",
            Source::Payments => "payments",
            Source::Transactions => "transactions",
            Source::Forwards => "forwards",
            Source::Settlements => "settlements",
            Source::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound chat message (Telegram HTML).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub source: Source,
    pub html: String,
}

impl Notification {
    pub fn new(source: Source, html: impl Into<String>) -> Self {
        Self {
            source,
            html: html.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<Notification>,
}

pub type OutboxReceiver = mpsc::Receiver<Notification>;

impl Outbox {
    pub fn channel(capacity: usize) -> (Outbox, OutboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Outbox { tx }, rx)
    }

    /// Queue a notification, waiting for room if the queue is full.
    ///
    /// Fails only when the delivery task is gone.
    pub async fn send(&self, notification: Notification) -> Result<()> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| Error::External("notification delivery task has stopped".to_string()))
    }

    /// Queue without waiting; fails when the queue is full or delivery is gone.
    pub fn try_send(&self, notification: Notification) -> Result<()> {
        self.tx.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::External("notification queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::External("notification delivery task has stopped".to_string())
            }
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DeliveryConfig {
    pub chat_id: ChatId,
    /// Minimum spacing between sends (Telegram allows roughly one message per
    /// second per chat).
    pub min_interval: Duration,
}

/// Drain `rx` into the chat until cancelled or every [`Outbox`] is dropped.
///
/// Send failures are logged and skipped; one bad message must not stall the queue.
pub async fn run_delivery(
    mut rx: OutboxReceiver,
    messenger: Arc<dyn MessagingPort>,
    cfg: DeliveryConfig,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!(chat_id = cfg.chat_id.0, "notification delivery started");
    let mut next_slot = Instant::now();

    loop {
        let notification = tokio::select! {
            _ = cancel.cancelled() => break,
            n = rx.recv() => match n {
                Some(n) => n,
                None => break,
            },
        };

        let now = Instant::now();
        if next_slot > now {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(next_slot - now) => {}
            }
        }
        next_slot = Instant::now() + cfg.min_interval;

        if let Err(e) = messenger.send_html(cfg.chat_id, &notification.html).await {
            tracing::warn!(
                source = %notification.source,
                "failed to deliver notification: {e}"
            );
        }
    }

    tracing::info!("notification delivery stopped");
    Ok(())
}
