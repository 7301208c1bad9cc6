//! Hexagonal ports for the external collaborators: the Lightning node, market
//! data and the host. Adapter crates implement these; tests use fakes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    host::HostMetrics,
    node::{
        BtcPrice, Channel, ClosedChannel, FeeEstimates, ForwardingEvent, ForwardingQuery, Invoice,
        NodeInfo, Payment, Transaction, WalletBalance,
    },
    Result,
};

/// Read-only RPC surface of the node.
#[async_trait]
pub trait LightningNode: Send + Sync {
    async fn get_info(&self) -> Result<NodeInfo>;
    async fn wallet_balance(&self) -> Result<WalletBalance>;
    async fn list_channels(&self) -> Result<Vec<Channel>>;
    async fn closed_channels(&self) -> Result<Vec<ClosedChannel>>;

    /// Most recent invoices, newest first.
    async fn list_invoices(&self, max: u32) -> Result<Vec<Invoice>>;
    async fn get_transactions(&self) -> Result<Vec<Transaction>>;

    /// Most recent payments, newest first.
    async fn list_payments(&self, max: u32) -> Result<Vec<Payment>>;
    async fn forwarding_history(&self, query: ForwardingQuery) -> Result<Vec<ForwardingEvent>>;

    /// Server-push stream of invoice updates (adds and settlements).
    async fn subscribe_invoices(&self) -> Result<Box<dyn InvoiceStream>>;
}

/// Lazy, unbounded sequence of invoice updates.
///
/// `Ok(None)` means the server closed the stream; it cannot be resumed.
#[async_trait]
pub trait InvoiceStream: Send {
    async fn next_invoice(&mut self) -> Result<Option<Invoice>>;
}

/// Produces a freshly authenticated node handle per call site.
///
/// Implementations read their credentials on every call and must surface
/// unreadable files as `Error::Connect`.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn LightningNode>>;
}

/// Third-party price and fee lookups (single attempt, no retry).
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn btc_price(&self) -> Result<BtcPrice>;
    async fn recommended_fees(&self) -> Result<FeeEstimates>;
}

/// Local host metrics.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn sample(&self) -> Result<HostMetrics>;
}
