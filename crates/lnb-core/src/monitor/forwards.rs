use std::time::Duration;

use async_trait::async_trait;

use super::Monitor;
use crate::{
    formatting::escape_html,
    node::{unix_now, ForwardingEvent, ForwardingQuery, MAX_FORWARD_EVENTS},
    outbox::Source,
    ports::LightningNode,
    Result,
};

/// Reports forwarding events inside a trailing time window.
///
/// Events that age out of the window simply drop out of the snapshot.
#[derive(Clone, Copy, Debug)]
pub struct ForwardMonitor {
    window: Duration,
}

impl ForwardMonitor {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

#[async_trait]
impl Monitor for ForwardMonitor {
    type Entry = ForwardingEvent;

    fn source(&self) -> Source {
        Source::Forwards
    }

    async fn fetch(&self, node: &dyn LightningNode) -> Result<Vec<(String, ForwardingEvent)>> {
        let query = ForwardingQuery::trailing(unix_now(), self.window, MAX_FORWARD_EVENTS);
        Ok(node
            .forwarding_history(query)
            .await?
            .into_iter()
            .map(|e| (e.key(), e))
            .collect())
    }

    fn describe(
        &self,
        previous: Option<&ForwardingEvent>,
        current: &ForwardingEvent,
    ) -> Option<String> {
        if previous.is_some() {
            return None;
        }
        Some(format!(
            "🔀 Forwarded {} sats ({} → {}), fee earned {} sats",
            current.amt_out,
            escape_html(&current.chan_id_in),
            escape_html(&current.chan_id_out),
            current.fee,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeNode;
    use crate::monitor::PollState;

    fn event(ts: u64, amt: u64) -> ForwardingEvent {
        ForwardingEvent {
            timestamp_ns: ts,
            chan_id_in: "100".to_string(),
            chan_id_out: "200".to_string(),
            amt_in: amt + 1,
            amt_out: amt,
            fee: 1,
            fee_msat: 1000,
        }
    }

    #[tokio::test]
    async fn keys_events_by_timestamp_channels_and_amount() {
        let node = FakeNode {
            forwards: vec![event(1, 500), event(2, 500)],
            ..Default::default()
        };
        let monitor = ForwardMonitor::new(Duration::from_secs(3600));
        let items = monitor.fetch(&node).await.unwrap();
        let keys: Vec<&str> = items.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["1:100:200:501", "2:100:200:501"]);
    }

    #[test]
    fn new_events_are_reported_and_aged_out_ones_are_not() {
        let monitor = ForwardMonitor::new(Duration::from_secs(3600));
        let mut state = PollState::default();
        let e1 = event(1, 500);
        let e2 = event(2, 700);
        state.apply(&monitor, Ok(vec![(e1.key(), e1.clone())]));

        let msgs = state.apply(&monitor, Ok(vec![(e2.key(), e2.clone())]));
        assert_eq!(
            msgs,
            vec!["🔀 Forwarded 700 sats (100 → 200), fee earned 1 sats".to_string()]
        );
    }
}
