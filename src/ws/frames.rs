// =============================================================================
// WebSocket wire frames — outbound subscribe + inbound classification
// =============================================================================
//
// Every inbound message is classified into exactly one of three shapes
// before any further processing: a data frame (topic + non-empty batch), a
// subscribe acknowledgement (handshake result + echoed arguments), or
// unrecognized.  Classification order matters: a data frame is tried first,
// then an acknowledgement, then everything else falls through.
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outbound subscribe frame: `{"op":"subscribe","args":["<topic>"]}`.
#[derive(Debug, Serialize)]
pub struct SubscribeFrame<'a> {
    pub op: &'static str,
    pub args: [&'a str; 1],
}

impl<'a> SubscribeFrame<'a> {
    pub fn new(encoded_topic: &'a str) -> Self {
        Self {
            op: "subscribe",
            args: [encoded_topic],
        }
    }
}

/// Inbound data frame.  Records stay as raw JSON values here; decoding them
/// into candles is a separate step so a bad batch only drops its own frame.
#[derive(Debug, Clone, Deserialize)]
pub struct DataFrame {
    pub topic: String,
    pub data: Vec<Value>,
}

/// Inbound acknowledgement of a subscribe request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionAck {
    pub success: bool,
    pub ret_msg: String,
    pub conn_id: Uuid,
    pub request: AckRequest,
}

/// The subscribe arguments the exchange echoes back; used to correlate the
/// acknowledgement with its pending request.
#[derive(Debug, Clone, Deserialize)]
pub struct AckRequest {
    pub op: String,
    pub args: Vec<String>,
}

impl SubscriptionAck {
    /// The single echoed topic string (classification guarantees exactly
    /// one argument; anything else routes as an orphan).
    pub fn topic(&self) -> &str {
        self.request.args.first().map(String::as_str).unwrap_or_default()
    }
}

/// The three inbound message shapes.
#[derive(Debug)]
pub enum InboundFrame {
    Data(DataFrame),
    Ack(SubscriptionAck),
    Unrecognized(Value),
}

/// Classify an already-parsed JSON message.
pub fn classify(message: Value) -> InboundFrame {
    if let Ok(frame) = DataFrame::deserialize(&message) {
        if !frame.data.is_empty() {
            return InboundFrame::Data(frame);
        }
    }

    if let Ok(ack) = SubscriptionAck::deserialize(&message) {
        if ack.request.op == "subscribe" && ack.request.args.len() == 1 {
            return InboundFrame::Ack(ack);
        }
    }

    InboundFrame::Unrecognized(message)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_serializes_to_the_wire_shape() {
        let frame = SubscribeFrame::new("klineV2.1.BTCUSD");
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"op":"subscribe","args":["klineV2.1.BTCUSD"]}"#
        );
    }

    #[test]
    fn data_frame_is_classified_first() {
        let message: Value = serde_json::from_str(
            r#"{"topic":"klineV2.1.BTCUSD","data":[{"start":1632103800}]}"#,
        )
        .unwrap();
        match classify(message) {
            InboundFrame::Data(frame) => {
                assert_eq!(frame.topic, "klineV2.1.BTCUSD");
                assert_eq!(frame.data.len(), 1);
            }
            other => panic!("expected data frame, got {other:?}"),
        }
    }

    #[test]
    fn empty_batch_is_not_a_data_frame() {
        let message: Value =
            serde_json::from_str(r#"{"topic":"klineV2.1.BTCUSD","data":[]}"#).unwrap();
        assert!(matches!(classify(message), InboundFrame::Unrecognized(_)));
    }

    #[test]
    fn acknowledgement_is_classified() {
        let message: Value = serde_json::from_str(
            r#"{
                "success": true,
                "ret_msg": "",
                "conn_id": "11111111-2222-3333-4444-555555555555",
                "request": {"op": "subscribe", "args": ["klineV2.1.BTCUSD"]}
            }"#,
        )
        .unwrap();
        match classify(message) {
            InboundFrame::Ack(ack) => {
                assert!(ack.success);
                assert_eq!(ack.topic(), "klineV2.1.BTCUSD");
            }
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn anything_else_is_unrecognized() {
        for raw in [
            r#"{"op":"pong"}"#,
            r#"{"success":true,"ret_msg":"","conn_id":"not-a-uuid","request":{"op":"subscribe","args":["x"]}}"#,
            r#"{"request":{"op":"unsubscribe","args":["x"]},"success":true,"ret_msg":"","conn_id":"11111111-2222-3333-4444-555555555555"}"#,
            r#"42"#,
        ] {
            let message: Value = serde_json::from_str(raw).unwrap();
            assert!(
                matches!(classify(message), InboundFrame::Unrecognized(_)),
                "expected unrecognized for {raw}"
            );
        }
    }
}
