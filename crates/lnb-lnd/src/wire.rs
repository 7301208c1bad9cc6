//! JSON shapes of the LND REST gateway.
//!
//! The gateway encodes 64-bit integers as strings and `bytes` fields as base64.
//! Every field is optional on the wire (proto3 omits defaults), hence
//! `#[serde(default)]` throughout.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize};

use lnb_core::node::{
    Channel, ClosedChannel, ForwardingEvent, ForwardingQuery, Invoice, NodeInfo, Payment,
    Transaction, WalletBalance,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw<T> {
    Num(T),
    Str(String),
}

fn lenient<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + std::str::FromStr + Default,
    T::Err: std::fmt::Display,
{
    match Raw::<T>::deserialize(d)? {
        Raw::Num(v) => Ok(v),
        Raw::Str(s) if s.is_empty() => Ok(T::default()),
        Raw::Str(s) => s.parse().map_err(de::Error::custom),
    }
}

pub(crate) fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    lenient(d)
}

pub(crate) fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    lenient(d)
}

/// base64 `bytes` field as lowercase hex; passes through anything that is not base64.
pub(crate) fn b64_to_hex(s: &str) -> String {
    match STANDARD.decode(s) {
        Ok(bytes) => hex::encode(bytes),
        Err(_) => s.to_string(),
    }
}

/// Error body of a failed call (grpc-gateway status).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RpcStatus {
    pub code: i32,
    pub message: String,
    /// Older gateways put the text here instead of `message`.
    pub error: String,
}

impl RpcStatus {
    pub fn detail(&self) -> &str {
        if self.message.is_empty() {
            &self.error
        } else {
            &self.message
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GetInfoResponse {
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

impl From<GetInfoResponse> for NodeInfo {
    fn from(w: GetInfoResponse) -> Self {
        Self {
            alias: w.alias,
            version: w.version,
            identity_pubkey: w.identity_pubkey,
            block_height: w.block_height,
            num_active_channels: w.num_active_channels,
            num_inactive_channels: w.num_inactive_channels,
            num_pending_channels: w.num_pending_channels,
            num_peers: w.num_peers,
            synced_to_chain: w.synced_to_chain,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WalletBalanceResponse {
    #[serde(deserialize_with = "lenient_i64")]
    pub total_balance: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub confirmed_balance: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub unconfirmed_balance: i64,
}

impl From<WalletBalanceResponse> for WalletBalance {
    fn from(w: WalletBalanceResponse) -> Self {
        Self {
            total_balance: w.total_balance,
            confirmed_balance: w.confirmed_balance,
            unconfirmed_balance: w.unconfirmed_balance,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListChannelsResponse {
    pub channels: Vec<WireChannel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireChannel {
    #[serde(deserialize_with = "lenient_u64")]
    pub chan_id: u64,
    pub remote_pubkey: String,
    pub channel_point: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub capacity: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub local_balance: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub remote_balance: i64,
    pub active: bool,
}

impl From<WireChannel> for Channel {
    fn from(w: WireChannel) -> Self {
        Self {
            chan_id: w.chan_id.to_string(),
            remote_pubkey: w.remote_pubkey,
            channel_point: w.channel_point,
            capacity: w.capacity,
            local_balance: w.local_balance,
            remote_balance: w.remote_balance,
            active: w.active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClosedChannelsResponse {
    pub channels: Vec<WireClosedChannel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireClosedChannel {
    #[serde(deserialize_with = "lenient_u64")]
    pub chan_id: u64,
    pub remote_pubkey: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub capacity: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub settled_balance: i64,
    pub close_type: String,
    pub closing_tx_hash: String,
}

impl From<WireClosedChannel> for ClosedChannel {
    fn from(w: WireClosedChannel) -> Self {
        Self {
            chan_id: w.chan_id.to_string(),
            remote_pubkey: w.remote_pubkey,
            capacity: w.capacity,
            settled_balance: w.settled_balance,
            close_type: w.close_type,
            closing_tx_hash: w.closing_tx_hash,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListInvoiceResponse {
    pub invoices: Vec<WireInvoice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireInvoice {
    /// base64
    pub r_hash: String,
    pub memo: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub value: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub amt_paid_sat: i64,
    pub settled: bool,
    #[serde(deserialize_with = "lenient_i64")]
    pub settle_date: i64,
    pub state: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub add_index: u64,
}

impl From<WireInvoice> for Invoice {
    fn from(w: WireInvoice) -> Self {
        Self {
            r_hash: b64_to_hex(&w.r_hash),
            memo: w.memo,
            value: w.value,
            amt_paid_sat: w.amt_paid_sat,
            settled: w.settled,
            settle_date: w.settle_date,
            state: w.state,
            add_index: w.add_index,
        }
    }
}

/// One line of the invoice subscription: `{"result": {...}}` or `{"error": {...}}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceStreamLine {
    pub result: Option<WireInvoice>,
    pub error: Option<RpcStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransactionDetails {
    pub transactions: Vec<WireTransaction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireTransaction {
    pub tx_hash: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub amount: i64,
    pub num_confirmations: i32,
    #[serde(deserialize_with = "lenient_i64")]
    pub time_stamp: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_fees: i64,
    pub label: String,
}

impl From<WireTransaction> for Transaction {
    fn from(w: WireTransaction) -> Self {
        Self {
            tx_hash: w.tx_hash,
            amount: w.amount,
            num_confirmations: w.num_confirmations,
            time_stamp: w.time_stamp,
            total_fees: w.total_fees,
            label: w.label,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListPaymentsResponse {
    pub payments: Vec<WirePayment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WirePayment {
    pub payment_hash: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub value_sat: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub fee_sat: i64,
    pub status: String,
    /// Seconds; deprecated upstream but still populated.
    #[serde(deserialize_with = "lenient_i64")]
    pub creation_date: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub creation_time_ns: i64,
    pub htlcs: Vec<WireHtlcAttempt>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireHtlcAttempt {
    pub status: String,
    pub route: WireRoute,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireRoute {
    pub hops: Vec<WireHop>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireHop {
    pub pub_key: String,
}

impl From<WirePayment> for Payment {
    fn from(w: WirePayment) -> Self {
        // The final hop of the successful attempt is the payee.
        let destination = w
            .htlcs
            .iter()
            .find(|h| h.status.eq_ignore_ascii_case("SUCCEEDED"))
            .and_then(|h| h.route.hops.last())
            .map(|hop| hop.pub_key.clone())
            .filter(|k| !k.is_empty());
        let creation_date = if w.creation_date > 0 {
            w.creation_date
        } else {
            w.creation_time_ns / 1_000_000_000
        };
        Self {
            payment_hash: w.payment_hash,
            value_sat: w.value_sat,
            fee_sat: w.fee_sat,
            status: w.status,
            creation_date,
            destination,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ForwardingHistoryRequest {
    pub start_time: String,
    pub end_time: String,
    pub num_max_events: u32,
}

impl From<ForwardingQuery> for ForwardingHistoryRequest {
    fn from(q: ForwardingQuery) -> Self {
        Self {
            start_time: q.start_time.to_string(),
            end_time: q.end_time.to_string(),
            num_max_events: q.max_events,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForwardingHistoryResponse {
    pub forwarding_events: Vec<WireForwardingEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireForwardingEvent {
    #[serde(deserialize_with = "lenient_u64")]
    pub timestamp_ns: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub chan_id_in: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub chan_id_out: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub amt_in: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub amt_out: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub fee: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub fee_msat: u64,
}

impl From<WireForwardingEvent> for ForwardingEvent {
    fn from(w: WireForwardingEvent) -> Self {
        Self {
            timestamp_ns: w.timestamp_ns,
            chan_id_in: w.chan_id_in.to_string(),
            chan_id_out: w.chan_id_out.to_string(),
            amt_in: w.amt_in,
            amt_out: w.amt_out,
            fee: w.fee,
            fee_msat: w.fee_msat,
        }
    }
}
