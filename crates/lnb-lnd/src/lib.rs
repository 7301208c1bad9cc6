//! LND adapter over the node's REST gateway.
//!
//! Authenticates with the admin macaroon (hex, `Grpc-Metadata-macaroon` header)
//! and pins the node's own TLS certificate. Credentials are re-read on every
//! [`LndConnector::connect`], so a rotated macaroon or certificate is picked up
//! without a restart.

pub mod stream;
pub mod tls;
pub mod wire;

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};

use lnb_core::{
    config::LndConfig,
    errors::Error,
    node::{
        Channel, ClosedChannel, ForwardingEvent, ForwardingQuery, Invoice, NodeInfo, Payment,
        Transaction, WalletBalance,
    },
    ports::{InvoiceStream, LightningNode, NodeConnector},
    Result,
};

use crate::{stream::RestInvoiceStream, wire::*};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LndConnector {
    cfg: LndConfig,
}

impl LndConnector {
    pub fn new(cfg: LndConfig) -> Self {
        Self { cfg }
    }
}

async fn read_credential(path: &Path, what: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::Connect(format!("cannot read {what} {}: {e}", path.display())))
}

fn build_http(cert_pem: &[u8], macaroon: &[u8]) -> Result<reqwest::Client> {
    let tls_config = tls::pinned_client_config(cert_pem)?;

    let mut headers = HeaderMap::new();
    headers.insert("Accept", HeaderValue::from_static("application/json"));
    headers.insert(
        "Grpc-Metadata-macaroon",
        HeaderValue::from_str(&hex::encode(macaroon))
            .map_err(|e| Error::Connect(format!("invalid macaroon header: {e}")))?,
    );

    // No overall timeout here: the invoice subscription stays open indefinitely.
    // Unary calls set their own per-request timeout.
    reqwest::Client::builder()
        .use_preconfigured_tls(tls_config)
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| Error::Connect(format!("http client build failed: {e}")))
}

#[async_trait]
impl NodeConnector for LndConnector {
    async fn connect(&self) -> Result<Arc<dyn LightningNode>> {
        let cert = read_credential(&self.cfg.tls_cert_path, "TLS certificate").await?;
        let macaroon = read_credential(&self.cfg.macaroon_path, "macaroon").await?;
        let http = build_http(&cert, &macaroon)?;
        Ok(Arc::new(LndClient {
            base_url: self.cfg.rest_url.trim_end_matches('/').to_string(),
            http,
            rpc_timeout: self.cfg.rpc_timeout,
        }))
    }
}

/// One authenticated session with the gateway.
#[derive(Clone, Debug)]
pub struct LndClient {
    base_url: String,
    http: reqwest::Client,
    rpc_timeout: Duration,
}

impl LndClient {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .timeout(self.rpc_timeout)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        decode(path, resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .timeout(self.rpc_timeout)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        decode(path, resp).await
    }
}

/// Unreachable node, TLS failure, timeout: all count as a failed remote call.
fn transport_error(path: &str, e: reqwest::Error) -> Error {
    tracing::debug!(path, "lnd request failed: {e}");
    if e.is_timeout() {
        return Error::Rpc(format!("request to {path} timed out"));
    }
    Error::Rpc(format!("node unreachable: {e}"))
}

async fn status_error(path: &str, resp: reqwest::Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<RpcStatus>(&body) {
        Ok(s) if !s.detail().is_empty() => Error::Rpc(s.detail().to_string()),
        _ => Error::Rpc(format!(
            "{path} returned {status}: {}",
            body.chars().take(200).collect::<String>()
        )),
    }
}

async fn decode<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T> {
    if !resp.status().is_success() {
        return Err(status_error(path, resp).await);
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| transport_error(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl LightningNode for LndClient {
    async fn get_info(&self) -> Result<NodeInfo> {
        let resp: GetInfoResponse = self.get("/v1/getinfo", &[]).await?;
        Ok(resp.into())
    }

    async fn wallet_balance(&self) -> Result<WalletBalance> {
        let resp: WalletBalanceResponse = self.get("/v1/balance/blockchain", &[]).await?;
        Ok(resp.into())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let resp: ListChannelsResponse = self.get("/v1/channels", &[]).await?;
        Ok(resp.channels.into_iter().map(Into::into).collect())
    }

    async fn closed_channels(&self) -> Result<Vec<ClosedChannel>> {
        let resp: ClosedChannelsResponse = self.get("/v1/channels/closed", &[]).await?;
        Ok(resp.channels.into_iter().map(Into::into).collect())
    }

    async fn list_invoices(&self, max: u32) -> Result<Vec<Invoice>> {
        let query = [
            ("reversed", "true".to_string()),
            ("num_max_invoices", max.to_string()),
        ];
        let resp: ListInvoiceResponse = self.get("/v1/invoices", &query).await?;
        // The page is the newest `max`, still in ascending order.
        Ok(resp.invoices.into_iter().rev().map(Into::into).collect())
    }

    async fn get_transactions(&self) -> Result<Vec<Transaction>> {
        let resp: TransactionDetails = self.get("/v1/transactions", &[]).await?;
        Ok(resp.transactions.into_iter().map(Into::into).collect())
    }

    async fn list_payments(&self, max: u32) -> Result<Vec<Payment>> {
        let query = [
            ("reversed", "true".to_string()),
            ("max_payments", max.to_string()),
            ("include_incomplete", "true".to_string()),
        ];
        let resp: ListPaymentsResponse = self.get("/v1/payments", &query).await?;
        Ok(resp.payments.into_iter().rev().map(Into::into).collect())
    }

    async fn forwarding_history(&self, query: ForwardingQuery) -> Result<Vec<ForwardingEvent>> {
        let body = ForwardingHistoryRequest::from(query);
        let resp: ForwardingHistoryResponse = self.post("/v1/switch", &body).await?;
        Ok(resp.forwarding_events.into_iter().map(Into::into).collect())
    }

    async fn subscribe_invoices(&self) -> Result<Box<dyn InvoiceStream>> {
        let path = "/v1/invoices/subscribe";
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        if !resp.status().is_success() {
            return Err(status_error(path, resp).await);
        }
        Ok(Box::new(RestInvoiceStream::new(resp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cfg(cert: PathBuf, macaroon: PathBuf) -> LndConfig {
        LndConfig {
            rest_url: "https://localhost:8080/".to_string(),
            tls_cert_path: cert,
            macaroon_path: macaroon,
            rpc_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn missing_certificate_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let connector = LndConnector::new(cfg(
            dir.path().join("tls.cert"),
            dir.path().join("admin.macaroon"),
        ));
        let err = connector.connect().await.err().unwrap();
        match err {
            Error::Connect(msg) => {
                assert!(msg.contains("TLS certificate"), "{msg}");
                assert!(msg.contains("tls.cert"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_macaroon_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls.cert");
        std::fs::write(&cert, b"-----BEGIN CERTIFICATE-----\n").unwrap();
        let connector = LndConnector::new(cfg(cert, dir.path().join("admin.macaroon")));
        let err = connector.connect().await.err().unwrap();
        assert!(
            matches!(err, Error::Connect(ref msg) if msg.contains("macaroon")),
            "{err:?}"
        );
        assert_eq!(err.kind(), lnb_core::ErrorKind::Unexpected);
    }

    #[tokio::test]
    async fn connects_with_self_signed_node_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls.cert");
        let macaroon = dir.path().join("admin.macaroon");
        std::fs::write(&cert, tls::tests::NODE_CERT).unwrap();
        std::fs::write(&macaroon, [0x02, 0x01, 0x03]).unwrap();
        assert!(LndConnector::new(cfg(cert, macaroon)).connect().await.is_ok());
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = LndClient {
            base_url: "https://localhost:8080/".trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            rpc_timeout: Duration::from_secs(1),
        };
        assert_eq!(client.url("/v1/getinfo"), "https://localhost:8080/v1/getinfo");
    }
}
