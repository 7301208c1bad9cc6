use std::sync::Arc;

use lnb_core::{config::Config, host::SysinfoProbe};
use lnb_lnd::LndConnector;
use lnb_market::MempoolClient;
use lnb_telegram::router::Backends;

#[tokio::main]
async fn main() -> Result<(), lnb_core::Error> {
    lnb_core::logging::init("lnb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        cert = %cfg.lnd.tls_cert_path.display(),
        macaroon = %cfg.lnd.macaroon_path.display(),
        poll_secs = cfg.poll_interval.as_secs(),
        "starting lightning node bot"
    );

    let backends = Backends {
        node: Arc::new(LndConnector::new(cfg.lnd.clone())),
        market: Arc::new(MempoolClient::new(
            cfg.market_api_url.clone(),
            cfg.http_timeout,
        )?),
        host: Arc::new(SysinfoProbe),
    };

    lnb_telegram::router::run_polling(cfg, backends)
        .await
        .map_err(|e| lnb_core::Error::External(format!("telegram bot failed: {e}")))?;

    tracing::info!("bye");
    Ok(())
}
