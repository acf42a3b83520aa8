// =============================================================================
// bybit-feed — typed client for Bybit's public market-data feed
// =============================================================================
//
// Two tightly coupled halves:
//   * notation codecs for the compact timeframe strings, the closed
//     tradepair list, and the dotted `klineV2.<timeframe>.<symbol>` topics;
//   * a subscription multiplexer that carries many logical kline streams
//     over one WebSocket connection, stitching a single authoritative
//     historical candle onto the front of each live stream before any live
//     data is delivered.
//
// Note: currently only supports inverse perpetual swaps.
// =============================================================================

pub mod error;
pub mod kline;
pub mod rest;
pub mod timeframe;
pub mod topic;
pub mod tradepair;
pub mod ws;

pub use error::{ParseError, ResyncError, SubscribeError};
pub use kline::{assemble, Candle, WsKline};
pub use rest::{BybitRestClient, KlineFetcher, KlinePage, KlineRequest, RestClientConfig, RestKline};
pub use timeframe::{Timeframe, TimeframeUnit};
pub use topic::{SubscriptionTopic, KLINE_CHANNEL};
pub use tradepair::Tradepair;
pub use ws::{BybitPublicWebsocket, KlineEvent, KlineStream, WebsocketSettings};
