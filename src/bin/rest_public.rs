// =============================================================================
// Manual harness — fetch the most recent complete candle over REST
// =============================================================================

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bybit_feed::rest::{BybitRestClient, KlineRequest, RestClientConfig};
use bybit_feed::timeframe::Timeframe;
use bybit_feed::tradepair::Tradepair;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let testnet = match std::env::var("BYBIT_TESTNET") {
        Ok(v) => !matches!(v.to_lowercase().as_str(), "0" | "false"),
        Err(_) => true,
    };
    let client = BybitRestClient::new(RestClientConfig {
        testnet,
        ..Default::default()
    });

    // Open of the previous minute candle.
    let now = Utc::now();
    let from = now - Duration::seconds(now.timestamp() % 60) - Duration::minutes(1);

    let page = client
        .kline(&KlineRequest {
            symbol: Tradepair::BTCUSD,
            interval: Timeframe::parse("1")?,
            from,
            limit: Some(1),
        })
        .await?;

    info!(server_time = %page.time_now, rows = page.result.len(), "kline query complete");
    for row in &page.result {
        println!("{}", serde_json::to_string_pretty(row)?);
    }

    Ok(())
}
