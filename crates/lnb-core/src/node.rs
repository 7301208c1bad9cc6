//! Read-only views of the node's RPC responses and of the external lookups.
//!
//! Amounts are satoshis unless the field name says otherwise.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Upper bound on events requested per forwarding history query.
pub const MAX_FORWARD_EVENTS: u32 = 10_000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub alias: String,
    pub version: String,
    pub identity_pubkey: String,
    pub block_height: u32,
    pub num_active_channels: u32,
    pub num_inactive_channels: u32,
    pub num_pending_channels: u32,
    pub num_peers: u32,
    pub synced_to_chain: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletBalance {
    pub total_balance: i64,
    pub confirmed_balance: i64,
    pub unconfirmed_balance: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Channel {
    pub chan_id: String,
    pub remote_pubkey: String,
    pub channel_point: String,
    pub capacity: i64,
    pub local_balance: i64,
    pub remote_balance: i64,
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClosedChannel {
    pub chan_id: String,
    pub remote_pubkey: String,
    pub capacity: i64,
    pub settled_balance: i64,
    pub close_type: String,
    pub closing_tx_hash: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Invoice {
    /// Payment hash, lowercase hex.
    pub r_hash: String,
    pub memo: String,
    pub value: i64,
    pub amt_paid_sat: i64,
    pub settled: bool,
    /// Unix seconds, 0 when unsettled.
    pub settle_date: i64,
    pub state: String,
    pub add_index: u64,
}

impl Invoice {
    /// `settled` is deprecated upstream in favor of `state`; accept either.
    pub fn is_settled(&self) -> bool {
        self.settled || self.state.eq_ignore_ascii_case("SETTLED")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub tx_hash: String,
    pub amount: i64,
    pub num_confirmations: i32,
    /// Unix seconds.
    pub time_stamp: i64,
    pub total_fees: i64,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payment {
    pub payment_hash: String,
    pub value_sat: i64,
    pub fee_sat: i64,
    pub status: String,
    /// Unix seconds.
    pub creation_date: i64,
    pub destination: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForwardingEvent {
    pub timestamp_ns: u64,
    pub chan_id_in: String,
    pub chan_id_out: String,
    pub amt_in: u64,
    pub amt_out: u64,
    pub fee: u64,
    pub fee_msat: u64,
}

impl ForwardingEvent {
    /// Forwarding events carry no id of their own; this combination is unique in practice.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.timestamp_ns, self.chan_id_in, self.chan_id_out, self.amt_in
        )
    }

    pub fn timestamp_secs(&self) -> i64 {
        (self.timestamp_ns / 1_000_000_000) as i64
    }
}

/// Time range for `forwarding_history`, in unix seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardingQuery {
    pub start_time: u64,
    pub end_time: u64,
    pub max_events: u32,
}

impl ForwardingQuery {
    /// The `window` ending at `now`.
    pub fn trailing(now: u64, window: Duration, max_events: u32) -> Self {
        Self {
            start_time: now.saturating_sub(window.as_secs()),
            end_time: now,
            max_events,
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BtcPrice {
    pub time: i64,
    pub usd: f64,
    pub eur: f64,
}

/// Recommended on-chain fee rates in sat/vB.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeeEstimates {
    pub fastest: u64,
    pub half_hour: u64,
    pub hour: u64,
    pub economy: u64,
    pub minimum: u64,
}
