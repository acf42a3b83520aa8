pub mod frames;
pub mod multiplexer;
pub mod transport;

// Re-export the subscription surface for convenient access
// (e.g. `use bybit_feed::ws::BybitPublicWebsocket`).
pub use multiplexer::{BybitPublicWebsocket, KlineEvent, KlineStream, WebsocketSettings};
pub use transport::{run_stream, MAINNET_WS_URL, TESTNET_WS_URL};
