//! Market data adapter (mempool.space-compatible API).
//!
//! One attempt per call; a failure surfaces to the caller as-is.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};

use lnb_core::{
    errors::Error,
    node::{BtcPrice, FeeEstimates},
    ports::MarketData,
    Result,
};

#[derive(Clone, Debug)]
pub struct MempoolClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PricesResponse {
    time: i64,
    #[serde(rename = "USD")]
    usd: f64,
    #[serde(rename = "EUR")]
    eur: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RecommendedFees {
    fastest_fee: u64,
    half_hour_fee: u64,
    hour_fee: u64,
    economy_fee: u64,
    minimum_fee: u64,
}

impl MempoolClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("market client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| Error::External(format!("market request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "market api {path} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::External(format!("market response error: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn to_price(p: PricesResponse) -> Result<BtcPrice> {
    if p.usd <= 0.0 {
        return Err(Error::External("market api returned no USD price".to_string()));
    }
    Ok(BtcPrice {
        time: p.time,
        usd: p.usd,
        eur: p.eur,
    })
}

fn to_fees(f: RecommendedFees) -> FeeEstimates {
    FeeEstimates {
        fastest: f.fastest_fee,
        half_hour: f.half_hour_fee,
        hour: f.hour_fee,
        economy: f.economy_fee,
        minimum: f.minimum_fee,
    }
}

#[async_trait]
impl MarketData for MempoolClient {
    async fn btc_price(&self) -> Result<BtcPrice> {
        to_price(self.get_json("/v1/prices").await?)
    }

    async fn recommended_fees(&self) -> Result<FeeEstimates> {
        Ok(to_fees(self.get_json("/v1/fees/recommended").await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prices() {
        let p: PricesResponse = serde_json::from_str(
            r#"{"time":1700000000,"USD":36512,"EUR":33900.5,"GBP":29000,"JPY":5400000}"#,
        )
        .unwrap();
        let price = to_price(p).unwrap();
        assert_eq!(price.time, 1_700_000_000);
        assert_eq!(price.usd, 36_512.0);
        assert_eq!(price.eur, 33_900.5);
    }

    #[test]
    fn missing_usd_price_is_an_error() {
        let p: PricesResponse = serde_json::from_str(r#"{"time":1}"#).unwrap();
        assert!(matches!(to_price(p), Err(Error::External(_))));
    }

    #[test]
    fn parses_recommended_fees() {
        let f: RecommendedFees = serde_json::from_str(
            r#"{"fastestFee":31,"halfHourFee":25,"hourFee":20,"economyFee":8,"minimumFee":4}"#,
        )
        .unwrap();
        assert_eq!(
            to_fees(f),
            FeeEstimates {
                fastest: 31,
                half_hour: 25,
                hour: 20,
                economy: 8,
                minimum: 4,
            }
        );
    }

    #[test]
    fn base_url_is_normalised() {
        let c = MempoolClient::new("https://mempool.space/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url, "https://mempool.space/api");
    }
}
