// =============================================================================
// Manual harness — subscribe to one kline topic and print the stream
// =============================================================================
//
// Environment:
//   BYBIT_TESTNET  "0"/"false" to hit production (default: testnet)
//   BYBIT_TOPIC    topic to subscribe to (default: klineV2.1.BTCUSD)
// =============================================================================

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bybit_feed::rest::{BybitRestClient, RestClientConfig};
use bybit_feed::topic::SubscriptionTopic;
use bybit_feed::ws::{self, BybitPublicWebsocket, WebsocketSettings};

fn env_testnet() -> bool {
    match std::env::var("BYBIT_TESTNET") {
        Ok(v) => !matches!(v.to_lowercase().as_str(), "0" | "false"),
        Err(_) => true,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let testnet = env_testnet();
    let topic_text =
        std::env::var("BYBIT_TOPIC").unwrap_or_else(|_| "klineV2.1.BTCUSD".to_string());
    let topic = SubscriptionTopic::parse(&topic_text)?;

    let fetcher = Arc::new(BybitRestClient::new(RestClientConfig {
        testnet,
        ..Default::default()
    }));
    let settings = WebsocketSettings {
        testnet,
        ..Default::default()
    };
    let (client, mut outbound) = BybitPublicWebsocket::new(fetcher, &settings);

    let url = if testnet {
        ws::TESTNET_WS_URL
    } else {
        ws::MAINNET_WS_URL
    };
    let transport_client = client.clone();
    let url_owned = url.to_string();
    let transport = tokio::spawn(async move {
        if let Err(e) = ws::run_stream(&url_owned, &transport_client, &mut outbound).await {
            error!(error = %e, "transport failed");
        }
    });

    let mut stream = client.subscribe(topic).await?;
    info!(topic = %topic, "subscribed — streaming candles (Ctrl+C to stop)");

    loop {
        tokio::select! {
            event = stream.recv() => match event {
                Some(Ok(batch)) => {
                    for candle in batch {
                        info!(
                            start = %candle.start,
                            open = candle.open,
                            close = candle.close,
                            confirmed = candle.confirmed,
                            "candle"
                        );
                    }
                }
                Some(Err(e)) => {
                    error!(error = %e, "subscription terminated");
                    break;
                }
                None => {
                    warn!("stream closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    transport.abort();
    Ok(())
}
