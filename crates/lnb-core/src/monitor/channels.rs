use async_trait::async_trait;

use super::Monitor;
use crate::{
    formatting::escape_html, node::Channel, outbox::Source, ports::LightningNode, Result,
};

/// Watches open channels: opened, offline, back online, closed.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelMonitor;

#[async_trait]
impl Monitor for ChannelMonitor {
    type Entry = Channel;

    fn source(&self) -> Source {
        Source::Channels
    }

    async fn fetch(&self, node: &dyn LightningNode) -> Result<Vec<(String, Channel)>> {
        Ok(node
            .list_channels()
            .await?
            .into_iter()
            .map(|c| (c.chan_id.clone(), c))
            .collect())
    }

    fn describe(&self, previous: Option<&Channel>, current: &Channel) -> Option<String> {
        let peer = escape_html(&current.remote_pubkey);
        match previous {
            None => Some(format!(
                "🆕 New channel opened with {peer}, Capacity: {} sats",
                current.capacity
            )),
            Some(prev) if prev.active && !current.active => {
                Some(format!("🔴 Channel with {peer} is now offline."))
            }
            Some(prev) if !prev.active && current.active => {
                Some(format!("🟢 Channel with {peer} is back online."))
            }
            Some(_) => None,
        }
    }

    fn vanished(&self, previous: &Channel) -> Option<String> {
        Some(format!(
            "📪 Channel with {} was closed.",
            escape_html(&previous.remote_pubkey)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::PollState;

    fn chan(id: &str, active: bool) -> Channel {
        Channel {
            chan_id: id.to_string(),
            remote_pubkey: format!("peer{id}"),
            capacity: 500_000,
            active,
            ..Default::default()
        }
    }

    fn cycle(channels: Vec<Channel>) -> Result<Vec<(String, Channel)>> {
        Ok(channels.into_iter().map(|c| (c.chan_id.clone(), c)).collect())
    }

    #[test]
    fn offline_is_reported_once() {
        let mut state = PollState::default();
        assert!(state.apply(&ChannelMonitor, cycle(vec![chan("1", true)])).is_empty());

        let msgs = state.apply(&ChannelMonitor, cycle(vec![chan("1", false)]));
        assert_eq!(msgs, vec!["🔴 Channel with peer1 is now offline.".to_string()]);

        assert!(state
            .apply(&ChannelMonitor, cycle(vec![chan("1", false)]))
            .is_empty());

        let msgs = state.apply(&ChannelMonitor, cycle(vec![chan("1", true)]));
        assert_eq!(msgs, vec!["🟢 Channel with peer1 is back online.".to_string()]);
    }

    #[test]
    fn opened_and_closed_channels() {
        let mut state = PollState::default();
        state.apply(&ChannelMonitor, cycle(vec![chan("1", true)]));

        let msgs = state.apply(&ChannelMonitor, cycle(vec![chan("2", true)]));
        assert_eq!(
            msgs,
            vec![
                "🆕 New channel opened with peer2, Capacity: 500000 sats".to_string(),
                "📪 Channel with peer1 was closed.".to_string(),
            ]
        );
    }

    #[test]
    fn closures_in_a_large_set_are_reported_in_key_order() {
        let mut state = PollState::default();
        let all: Vec<Channel> = (0..2000).map(|i| chan(&format!("{i:05}"), true)).collect();
        state.apply(&ChannelMonitor, cycle(all.clone()));

        let remaining: Vec<Channel> = all
            .into_iter()
            .filter(|c| c.chan_id != "00042" && c.chan_id != "01999")
            .collect();
        let msgs = state.apply(&ChannelMonitor, cycle(remaining.clone()));
        assert_eq!(
            msgs,
            vec![
                "📪 Channel with peer00042 was closed.".to_string(),
                "📪 Channel with peer01999 was closed.".to_string(),
            ]
        );
        assert!(state.apply(&ChannelMonitor, cycle(remaining)).is_empty());
    }

    #[test]
    fn channels_present_at_startup_are_not_announced() {
        let mut state = PollState::default();
        let msgs = state.apply(
            &ChannelMonitor,
            cycle(vec![chan("1", false), chan("2", true)]),
        );
        assert!(msgs.is_empty());
    }
}
