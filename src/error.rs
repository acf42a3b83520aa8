// =============================================================================
// Error taxonomy for the Bybit feed client
// =============================================================================
//
// Parse failures (grammar + domain constraints) are always recoverable and
// returned to the immediate caller.  Subscription failures are synchronous
// and typed.  A resync failure is terminal for the one subscription it hit:
// it is delivered as the final event on that stream, never as a process
// abort.
// =============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure to decode a timeframe, tradepair, or subscription topic.
///
/// Grammar variants mean the text did not match the notation at all; the
/// constraint variant means the notation was well-formed but the value is
/// outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed timeframe notation: {0:?}")]
    TimeframeGrammar(String),

    #[error("unsupported timeframe: {0:?} (minutes must be 1 or 60; hours, days and weeks must be 1)")]
    TimeframeConstraint(String),

    #[error("unknown tradepair: {0:?}")]
    UnknownTradepair(String),

    #[error("malformed subscription topic: {0:?}")]
    TopicGrammar(String),
}

/// Failure to establish a WebSocket subscription.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// The encoded topic is already pending or live.  Duplicate subscribes
    /// are rejected synchronously, never silently merged.
    #[error("already subscribed to topic {0}")]
    AlreadySubscribed(String),

    /// No acknowledgement arrived within the configured wait.  The pending
    /// entry has been removed, so the topic may be subscribed again.
    #[error("no acknowledgement for topic {topic} within {timeout:?}")]
    AckTimeout { topic: String, timeout: Duration },

    /// The exchange acknowledged the request with `success == false`.
    #[error("exchange rejected subscription to {topic}: {ret_msg}")]
    Rejected { topic: String, ret_msg: String },

    /// The outbound side of the connection is gone.
    #[error("websocket connection closed")]
    ConnectionClosed,
}

/// Failure to stitch the historical candle onto the front of a live stream.
///
/// Delivered as the terminal event on the affected subscription's stream;
/// the per-topic worker stops and later frames for that topic are dropped.
#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("historical kline query failed: {0}")]
    Fetch(#[from] anyhow::Error),

    #[error("historical kline response has no candle opening at {expected_open}")]
    CandleMissing { expected_open: DateTime<Utc> },
}
