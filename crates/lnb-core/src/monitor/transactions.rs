use async_trait::async_trait;

use super::Monitor;
use crate::{
    formatting::escape_html, node::Transaction, outbox::Source, ports::LightningNode, Result,
};

/// Reports on-chain wallet transactions not seen in the previous cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionMonitor;

#[async_trait]
impl Monitor for TransactionMonitor {
    type Entry = Transaction;

    fn source(&self) -> Source {
        Source::Transactions
    }

    async fn fetch(&self, node: &dyn LightningNode) -> Result<Vec<(String, Transaction)>> {
        Ok(node
            .get_transactions()
            .await?
            .into_iter()
            .map(|t| (t.tx_hash.clone(), t))
            .collect())
    }

    fn describe(&self, previous: Option<&Transaction>, current: &Transaction) -> Option<String> {
        if previous.is_some() {
            return None;
        }
        let direction = if current.amount < 0 { "📤" } else { "📥" };
        Some(format!(
            "{direction} New on-chain transaction: {} sats, Tx Hash: {}",
            current.amount,
            escape_html(&current.tx_hash),
        ))
    }
}
