//! Settlement stream watcher.
//!
//! Unlike the pollers this consumes the node's invoice subscription, so it
//! sees settlements as they happen. When the stream closes or fails it reports
//! once, waits, and subscribes again on a fresh connection.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{error_notification, invoices::payment_received};
use crate::{
    errors::Error,
    node::Invoice,
    outbox::{Notification, Outbox, Source},
    ports::NodeConnector,
    Result,
};

/// Remembers which settled invoices were already announced.
///
/// Grows for the lifetime of the process; settlements are rare enough.
#[derive(Debug, Default)]
pub struct SettlementDedupe {
    seen: HashSet<String>,
}

impl SettlementDedupe {
    /// Message for a first-seen settled invoice, `None` otherwise.
    pub fn observe(&mut self, invoice: &Invoice) -> Option<String> {
        if !invoice.is_settled() {
            return None;
        }
        if !self.seen.insert(invoice.r_hash.clone()) {
            return None;
        }
        Some(payment_received(invoice))
    }

    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Read one subscription until it ends. `Ok(())` means the server closed it.
async fn consume(
    connector: &dyn NodeConnector,
    dedupe: &mut SettlementDedupe,
    outbox: &Outbox,
) -> Result<()> {
    let node = connector.connect().await?;
    let mut stream = node.subscribe_invoices().await?;
    tracing::info!("subscribed to invoice updates");

    while let Some(invoice) = stream.next_invoice().await? {
        if let Some(html) = dedupe.observe(&invoice) {
            tracing::info!(amt_paid_sat = invoice.amt_paid_sat, "invoice settled");
            outbox
                .send(Notification::new(Source::Settlements, html))
                .await?;
        }
    }
    Ok(())
}

pub async fn run_settlement_watcher(
    connector: Arc<dyn NodeConnector>,
    outbox: Outbox,
    resubscribe_delay: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!(
        retry_secs = resubscribe_delay.as_secs(),
        "settlement watcher started"
    );
    let mut dedupe = SettlementDedupe::default();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            r = consume(connector.as_ref(), &mut dedupe, &outbox) => r,
        };
        let err = match outcome {
            Ok(()) => Error::Rpc("invoice subscription closed by the node".to_string()),
            Err(e) => e,
        };
        tracing::warn!(
            seen = dedupe.len(),
            "invoice subscription interrupted: {err}"
        );

        let html = error_notification(Source::Settlements, &err);
        tokio::select! {
            _ = cancel.cancelled() => break,
            r = outbox.send(Notification::new(Source::Settlements, html)) => r?,
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(resubscribe_delay) => {}
        }
    }

    tracing::info!("settlement watcher stopped");
    Ok(())
}
