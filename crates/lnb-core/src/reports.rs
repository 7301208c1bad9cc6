//! On-demand reports: one per menu button / command.
//!
//! Each report is read-only and idempotent. All RPC calls of a report run inside
//! one fallible function, so a failure anywhere replaces the whole reply with an
//! error message instead of a half-rendered report.

use std::{fmt::Write as _, sync::Arc, time::Duration};

use crate::{
    errors::{Error, ErrorKind},
    formatting::{escape_html, format_bytes, format_duration, format_unix_time, shorten},
    host::HostMetrics,
    messaging::types::{InlineButton, InlineKeyboard},
    node::{
        unix_now, BtcPrice, Channel, ClosedChannel, FeeEstimates, ForwardingEvent,
        ForwardingQuery, Invoice, NodeInfo, Payment, Transaction, WalletBalance,
        MAX_FORWARD_EVENTS,
    },
    ports::{HostProbe, MarketData, NodeConnector},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportKind {
    NodeInfo,
    Channels,
    ClosedChannels,
    Transactions,
    Invoices,
    Payments,
    Forwards,
    Price,
    Fees,
    System,
}

impl ReportKind {
    pub const ALL: [ReportKind; 10] = [
        ReportKind::NodeInfo,
        ReportKind::Channels,
        ReportKind::ClosedChannels,
        ReportKind::Transactions,
        ReportKind::Invoices,
        ReportKind::Payments,
        ReportKind::Forwards,
        ReportKind::Price,
        ReportKind::Fees,
        ReportKind::System,
    ];

    /// Opaque id carried by the inline keyboard button.
    pub fn callback_data(self) -> &'static str {
        match self {
            ReportKind::NodeInfo => "nodeinfo",
            ReportKind::Channels => "channelinfo",
            ReportKind::ClosedChannels => "closedchannels",
            ReportKind::Transactions => "recenttransactions",
            ReportKind::Invoices => "invoices",
            ReportKind::Payments => "payments",
            ReportKind::Forwards => "forwards",
            ReportKind::Price => "price",
            ReportKind::Fees => "fees",
            ReportKind::System => "system",
        }
    }

    /// Slash command name (without `/`).
    pub fn command(self) -> &'static str {
        match self {
            ReportKind::NodeInfo => "nodeinfo",
            ReportKind::Channels => "channels",
            ReportKind::ClosedChannels => "closed",
            ReportKind::Transactions => "transactions",
            ReportKind::Invoices => "invoices",
            ReportKind::Payments => "payments",
            ReportKind::Forwards => "forwards",
            ReportKind::Price => "price",
            ReportKind::Fees => "fees",
            ReportKind::System => "system",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportKind::NodeInfo => "⚡ Node Info",
            ReportKind::Channels => "📊 Channel Info",
            ReportKind::ClosedChannels => "🗄️ Closed Channels",
            ReportKind::Transactions => "🔄 Recent Transactions",
            ReportKind::Invoices => "🧾 Invoices",
            ReportKind::Payments => "💸 Payments",
            ReportKind::Forwards => "🔀 Forwarding",
            ReportKind::Price => "💲 BTC Price",
            ReportKind::Fees => "⛽ On-chain Fees",
            ReportKind::System => "🖥️ System",
        }
    }

    /// What the report is about, for error replies.
    pub fn subject(self) -> &'static str {
        match self {
            ReportKind::NodeInfo => "node info",
            ReportKind::Channels => "channel info",
            ReportKind::ClosedChannels => "closed channels",
            ReportKind::Transactions => "recent transactions",
            ReportKind::Invoices => "invoices",
            ReportKind::Payments => "payments",
            ReportKind::Forwards => "forwarding events",
            ReportKind::Price => "BTC price",
            ReportKind::Fees => "fee estimates",
            ReportKind::System => "system metrics",
        }
    }

    pub fn from_callback(data: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.callback_data() == data.trim())
    }

    pub fn from_command(cmd: &str) -> Option<Self> {
        let cmd = cmd.trim().trim_start_matches('/').to_lowercase();
        Self::ALL.into_iter().find(|k| k.command() == cmd)
    }
}

/// The `/start` menu: every report, two buttons per row.
pub fn menu_keyboard() -> InlineKeyboard {
    let buttons = ReportKind::ALL
        .into_iter()
        .map(|k| InlineButton {
            label: k.label().to_string(),
            callback_data: k.callback_data().to_string(),
        })
        .collect();
    InlineKeyboard::grid(buttons, 2)
}

#[derive(Clone, Copy, Debug)]
pub struct ReportLimits {
    pub recent_items: usize,
    pub forwarding_window: Duration,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            recent_items: 10,
            forwarding_window: Duration::from_secs(24 * 3600),
        }
    }
}

pub struct Reports {
    connector: Arc<dyn NodeConnector>,
    market: Arc<dyn MarketData>,
    host: Arc<dyn HostProbe>,
    limits: ReportLimits,
}

impl Reports {
    pub fn new(
        connector: Arc<dyn NodeConnector>,
        market: Arc<dyn MarketData>,
        host: Arc<dyn HostProbe>,
        limits: ReportLimits,
    ) -> Self {
        Self {
            connector,
            market,
            host,
            limits,
        }
    }

    /// Render a report, substituting an error reply on any failure.
    pub async fn render(&self, kind: ReportKind) -> String {
        match self.try_render(kind).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(report = kind.callback_data(), "report failed: {e}");
                error_reply(kind, &e)
            }
        }
    }

    async fn try_render(&self, kind: ReportKind) -> Result<String> {
        let recent = self.limits.recent_items;
        match kind {
            ReportKind::NodeInfo => {
                let node = self.connector.connect().await?;
                let info = node.get_info().await?;
                let balance = node.wallet_balance().await?;
                let channels = node.list_channels().await?;
                Ok(node_info_report(&info, &balance, &channels))
            }
            ReportKind::Channels => {
                let node = self.connector.connect().await?;
                Ok(channels_report(&node.list_channels().await?))
            }
            ReportKind::ClosedChannels => {
                let node = self.connector.connect().await?;
                Ok(closed_channels_report(&node.closed_channels().await?, recent))
            }
            ReportKind::Transactions => {
                let node = self.connector.connect().await?;
                Ok(transactions_report(&node.get_transactions().await?, recent))
            }
            ReportKind::Invoices => {
                let node = self.connector.connect().await?;
                Ok(invoices_report(&node.list_invoices(page_size(recent)).await?, recent))
            }
            ReportKind::Payments => {
                let node = self.connector.connect().await?;
                Ok(payments_report(&node.list_payments(page_size(recent)).await?, recent))
            }
            ReportKind::Forwards => {
                let node = self.connector.connect().await?;
                let query = ForwardingQuery::trailing(
                    unix_now(),
                    self.limits.forwarding_window,
                    MAX_FORWARD_EVENTS,
                );
                let events = node.forwarding_history(query).await?;
                Ok(forwards_report(
                    &events,
                    self.limits.forwarding_window,
                    recent,
                ))
            }
            ReportKind::Price => Ok(price_report(&self.market.btc_price().await?)),
            ReportKind::Fees => Ok(fees_report(&self.market.recommended_fees().await?)),
            ReportKind::System => Ok(system_report(&self.host.sample().await?)),
        }
    }
}

/// RPC page size for a list report.
fn page_size(recent: usize) -> u32 {
    u32::try_from(recent).unwrap_or(u32::MAX)
}

pub fn error_reply(kind: ReportKind, err: &Error) -> String {
    match err.kind() {
        ErrorKind::RemoteCallFailed => format!(
            "❌ Error retrieving {}: {}",
            kind.subject(),
            escape_html(&err.detail())
        ),
        ErrorKind::Unexpected => format!(
            "❌ Unexpected error while retrieving {}: {}",
            kind.subject(),
            escape_html(&err.to_string())
        ),
    }
}

pub fn node_info_report(info: &NodeInfo, balance: &WalletBalance, channels: &[Channel]) -> String {
    let lightning_balance: i64 = channels.iter().map(|c| c.local_balance).sum();
    let active = channels.iter().filter(|c| c.active).count();
    format!(
        "⚡ Alias: {}\n\
         🛠️ Version: {}\n\
         🔢 Block Height: {}\n\
         💰 On-chain Balance: {} sats\n\
         ⚡ Lightning Balance: {} sats\n\
         🔗 Total Channels: {}\n\
         🟢 Active Channels: {}\n\
         🔄 Synced to chain: {}",
        escape_html(&info.alias),
        escape_html(&info.version),
        info.block_height,
        balance.total_balance,
        lightning_balance,
        channels.len(),
        active,
        if info.synced_to_chain { "yes" } else { "no" },
    )
}

pub fn channels_report(channels: &[Channel]) -> String {
    if channels.is_empty() {
        return "📊 No open channels.".to_string();
    }
    let mut out = format!("📊 Channels ({}):", channels.len());
    for c in channels {
        let _ = write!(
            out,
            "\n{} Channel with {}, Capacity: {}, Local Balance: {}, Remote Balance: {}",
            if c.active { "🟢" } else { "🔴" },
            escape_html(&c.remote_pubkey),
            c.capacity,
            c.local_balance,
            c.remote_balance,
        );
    }
    out
}

pub fn closed_channels_report(channels: &[ClosedChannel], recent: usize) -> String {
    if channels.is_empty() {
        return "🗄️ No closed channels.".to_string();
    }
    let mut out = format!("🗄️ Closed Channels ({}):", channels.len());
    // Closed channels come back oldest first.
    for c in channels.iter().rev().take(recent) {
        let _ = write!(
            out,
            "\n📪 {} with {}, Capacity: {}, Settled: {}, Tx: {}",
            escape_html(&c.close_type),
            escape_html(&shorten(&c.remote_pubkey, 8)),
            c.capacity,
            c.settled_balance,
            escape_html(&shorten(&c.closing_tx_hash, 8)),
        );
    }
    out
}

pub fn transactions_report(transactions: &[Transaction], recent: usize) -> String {
    if transactions.is_empty() {
        return "🔄 No on-chain transactions.".to_string();
    }
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| b.time_stamp.cmp(&a.time_stamp));

    let mut out = "🔄 Recent Transactions:".to_string();
    for tx in sorted.into_iter().take(recent) {
        let _ = write!(
            out,
            "\n🔄 Tx Hash: {}, Amount: {} sats, Confirmations: {}, {}",
            escape_html(&tx.tx_hash),
            tx.amount,
            tx.num_confirmations,
            format_unix_time(tx.time_stamp),
        );
        if !tx.label.is_empty() {
            let _ = write!(out, " ({})", escape_html(&tx.label));
        }
    }
    out
}

pub fn invoices_report(invoices: &[Invoice], recent: usize) -> String {
    if invoices.is_empty() {
        return "🧾 No invoices.".to_string();
    }
    let mut sorted: Vec<&Invoice> = invoices.iter().collect();
    sorted.sort_by(|a, b| b.add_index.cmp(&a.add_index));

    let mut out = "🧾 Recent Invoices:".to_string();
    for inv in sorted.into_iter().take(recent) {
        let memo = if inv.memo.is_empty() {
            "-".to_string()
        } else {
            escape_html(&inv.memo)
        };
        if inv.is_settled() {
            let _ = write!(
                out,
                "\n✅ {} sats paid, Memo: {}, {}",
                inv.amt_paid_sat,
                memo,
                format_unix_time(inv.settle_date),
            );
        } else {
            let _ = write!(
                out,
                "\n⏳ {} sats {}, Memo: {}",
                inv.value,
                escape_html(&inv.state.to_lowercase()),
                memo,
            );
        }
    }
    out
}

pub fn payments_report(payments: &[Payment], recent: usize) -> String {
    if payments.is_empty() {
        return "💸 No payments.".to_string();
    }
    let mut sorted: Vec<&Payment> = payments.iter().collect();
    sorted.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));

    let mut out = "💸 Recent Payments:".to_string();
    for p in sorted.into_iter().take(recent) {
        let _ = write!(
            out,
            "\n{} {} sats (fee {}), {}, {}",
            payment_icon(&p.status),
            p.value_sat,
            p.fee_sat,
            escape_html(&p.status.to_lowercase()),
            format_unix_time(p.creation_date),
        );
        if let Some(dest) = &p.destination {
            let _ = write!(out, ", to {}", escape_html(&shorten(dest, 8)));
        }
    }
    out
}

pub fn payment_icon(status: &str) -> &'static str {
    match status.to_ascii_uppercase().as_str() {
        "SUCCEEDED" => "✅",
        "FAILED" => "❌",
        _ => "⏳",
    }
}

pub fn forwards_report(events: &[ForwardingEvent], window: Duration, recent: usize) -> String {
    let label = format_duration(window);
    if events.is_empty() {
        return format!("🔀 No forwarding events in the last {label}.");
    }
    let fees: u64 = events.iter().map(|e| e.fee).sum();
    let volume: u64 = events.iter().map(|e| e.amt_out).sum();

    let mut sorted: Vec<&ForwardingEvent> = events.iter().collect();
    sorted.sort_by(|a, b| b.timestamp_ns.cmp(&a.timestamp_ns));

    let mut out = format!(
        "🔀 Forwarding (last {label}):\nEvents: {}\nRouted: {} sats\nFees earned: {} sats",
        events.len(),
        volume,
        fees,
    );
    for e in sorted.into_iter().take(recent) {
        let _ = write!(
            out,
            "\n🔀 {} sats {} → {}, fee {} sats, {}",
            e.amt_out,
            escape_html(&e.chan_id_in),
            escape_html(&e.chan_id_out),
            e.fee,
            format_unix_time(e.timestamp_secs()),
        );
    }
    out
}

pub fn price_report(price: &BtcPrice) -> String {
    format!(
        "💲 BTC Price\nUSD: ${:.0}\nEUR: €{:.0}\nUpdated: {}",
        price.usd,
        price.eur,
        format_unix_time(price.time),
    )
}

pub fn fees_report(fees: &FeeEstimates) -> String {
    format!(
        "⛽ Recommended Fees (sat/vB)\n\
         Fastest: {}\n\
         Half hour: {}\n\
         Hour: {}\n\
         Economy: {}\n\
         Minimum: {}",
        fees.fastest, fees.half_hour, fees.hour, fees.economy, fees.minimum,
    )
}

pub fn system_report(m: &HostMetrics) -> String {
    let mut out = format!(
        "🖥️ Host: {}\n\
         CPU: {:.1}%\n\
         Memory: {} / {}\n\
         Load: {:.2} {:.2} {:.2}\n\
         Uptime: {}",
        escape_html(m.host_name.as_deref().unwrap_or("unknown")),
        m.cpu_percent,
        format_bytes(m.memory_used),
        format_bytes(m.memory_total),
        m.load_average[0],
        m.load_average[1],
        m.load_average[2],
        format_duration(m.uptime),
    );
    for d in &m.disks {
        let pct = if d.total > 0 {
            d.used as f64 * 100.0 / d.total as f64
        } else {
            0.0
        };
        let _ = write!(
            out,
            "\n💾 {}: {} / {} ({pct:.0}%)",
            escape_html(&d.mount_point),
            format_bytes(d.used),
            format_bytes(d.total),
        );
    }
    out
}
