use async_trait::async_trait;

use super::Monitor;
use crate::{
    formatting::{escape_html, shorten},
    node::Payment,
    outbox::Source,
    ports::LightningNode,
    reports::payment_icon,
    Result,
};

/// Reports outgoing payments the node has not shown before.
#[derive(Clone, Copy, Debug)]
pub struct PaymentMonitor {
    max: u32,
}

impl PaymentMonitor {
    pub fn new(max: u32) -> Self {
        Self { max }
    }
}

#[async_trait]
impl Monitor for PaymentMonitor {
    type Entry = Payment;

    fn source(&self) -> Source {
        Source::Payments
    }

    async fn fetch(&self, node: &dyn LightningNode) -> Result<Vec<(String, Payment)>> {
        Ok(node
            .list_payments(self.max)
            .await?
            .into_iter()
            .map(|p| (p.payment_hash.clone(), p))
            .collect())
    }

    fn describe(&self, previous: Option<&Payment>, current: &Payment) -> Option<String> {
        if previous.is_some() {
            return None;
        }
        let mut msg = format!(
            "{} Payment of {} sats {} (fee {} sats)",
            payment_icon(&current.status),
            current.value_sat,
            escape_html(&current.status.to_lowercase()),
            current.fee_sat,
        );
        if let Some(dest) = &current.destination {
            msg.push_str(&format!(" to {}", escape_html(&shorten(dest, 8))));
        }
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::PollState;

    fn pay(hash: &str, status: &str) -> (String, Payment) {
        (
            hash.to_string(),
            Payment {
                payment_hash: hash.to_string(),
                value_sat: 2500,
                fee_sat: 3,
                status: status.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn only_new_hashes_are_reported() {
        let monitor = PaymentMonitor::new(50);
        let mut state = PollState::default();
        state.apply(&monitor, Ok(vec![pay("a", "SUCCEEDED")]));

        let msgs = state.apply(
            &monitor,
            Ok(vec![pay("b", "FAILED"), pay("a", "SUCCEEDED")]),
        );
        assert_eq!(
            msgs,
            vec!["❌ Payment of 2500 sats failed (fee 3 sats)".to_string()]
        );

        // A status change on a known hash is not a new payment.
        let msgs = state.apply(&monitor, Ok(vec![pay("b", "SUCCEEDED")]));
        assert!(msgs.is_empty());
    }
}
