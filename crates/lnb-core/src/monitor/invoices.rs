use async_trait::async_trait;

use super::Monitor;
use crate::{
    formatting::escape_html, node::Invoice, outbox::Source, ports::LightningNode, Result,
};

/// Polls recent invoices and reports the ones that became settled.
#[derive(Clone, Copy, Debug)]
pub struct InvoiceMonitor {
    max: u32,
}

impl InvoiceMonitor {
    pub fn new(max: u32) -> Self {
        Self { max }
    }
}

/// Shared with the settlement stream so both paths read the same.
pub fn payment_received(invoice: &Invoice) -> String {
    let memo = if invoice.memo.is_empty() {
        "-".to_string()
    } else {
        escape_html(&invoice.memo)
    };
    format!(
        "💰 Received a Lightning payment of {} sats. Memo: {memo}",
        invoice.amt_paid_sat
    )
}

#[async_trait]
impl Monitor for InvoiceMonitor {
    type Entry = Invoice;

    fn source(&self) -> Source {
        Source::Invoices
    }

    async fn fetch(&self, node: &dyn LightningNode) -> Result<Vec<(String, Invoice)>> {
        Ok(node
            .list_invoices(self.max)
            .await?
            .into_iter()
            .map(|i| (i.r_hash.clone(), i))
            .collect())
    }

    fn describe(&self, previous: Option<&Invoice>, current: &Invoice) -> Option<String> {
        let was_settled = previous.is_some_and(Invoice::is_settled);
        (current.is_settled() && !was_settled).then(|| payment_received(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::PollState;

    fn inv(hash: &str, state: &str, paid: i64) -> (String, Invoice) {
        (
            hash.to_string(),
            Invoice {
                r_hash: hash.to_string(),
                memo: format!("memo {hash}"),
                value: 1000,
                amt_paid_sat: paid,
                state: state.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn reports_transition_to_settled() {
        let monitor = InvoiceMonitor::new(10);
        let mut state = PollState::default();
        state.apply(&monitor, Ok(vec![inv("a", "OPEN", 0)]));

        let msgs = state.apply(
            &monitor,
            Ok(vec![inv("a", "SETTLED", 1000), inv("b", "OPEN", 0)]),
        );
        assert_eq!(
            msgs,
            vec!["💰 Received a Lightning payment of 1000 sats. Memo: memo a".to_string()]
        );

        // Still settled next cycle: nothing new.
        let msgs = state.apply(&monitor, Ok(vec![inv("a", "SETTLED", 1000)]));
        assert!(msgs.is_empty());
    }

    #[test]
    fn new_invoice_already_settled_is_reported() {
        let monitor = InvoiceMonitor::new(10);
        let mut state = PollState::default();
        state.apply(&monitor, Ok(vec![]));
        let msgs = state.apply(&monitor, Ok(vec![inv("c", "SETTLED", 42)]));
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("42 sats"));
    }
}
