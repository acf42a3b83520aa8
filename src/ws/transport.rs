// =============================================================================
// WebSocket transport glue
// =============================================================================

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::ws::multiplexer::BybitPublicWebsocket;

/// Production public stream endpoint.
pub const MAINNET_WS_URL: &str = "wss://stream.bybit.com/realtime";
/// Testnet public stream endpoint.
pub const TESTNET_WS_URL: &str = "wss://stream-testnet.bybit.com/realtime";

/// Connect to the public stream, pump queued outbound frames onto the
/// socket, and feed inbound text frames to the multiplexer's single dispatch
/// path.
///
/// Runs until the stream disconnects or an error occurs, then returns so the
/// caller can decide about reconnection.
pub async fn run_stream(
    url: &str,
    ws: &BybitPublicWebsocket,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    info!(url = %url, "connecting to public WebSocket");

    let (stream, _response) = connect_async(url)
        .await
        .context("failed to connect to public WebSocket")?;

    info!("public WebSocket connected");
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => write
                    .send(Message::Text(text))
                    .await
                    .context("failed to send frame")?,
                // Multiplexer dropped; nothing left to do.
                None => return Ok(()),
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => ws.handle_message(&text),
                // tungstenite answers protocol pings automatically; binary
                // and close payloads carry nothing we route.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "public WebSocket read error");
                    return Err(e.into());
                }
                None => {
                    warn!("public WebSocket stream ended");
                    return Ok(());
                }
            },
        }
    }
}
