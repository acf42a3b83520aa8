// =============================================================================
// Subscription topic — `klineV2.<timeframe>.<symbol>`
// =============================================================================
//
// The encoded string is the canonical identity key of a logical subscription:
// two topics are the same subscription iff their encodings are equal.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;
use crate::timeframe::Timeframe;
use crate::tradepair::Tradepair;

/// Channel token of the public kline stream.
pub const KLINE_CHANNEL: &str = "klineV2";

const SEPARATOR: char = '.';

/// One logical kline subscription: channel, interval, instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionTopic {
    pub timeframe: Timeframe,
    pub symbol: Tradepair,
}

impl SubscriptionTopic {
    pub fn new(timeframe: Timeframe, symbol: Tradepair) -> Self {
        Self { timeframe, symbol }
    }

    /// Parse a full topic string.  The channel token must match exactly and
    /// the whole input must be consumed; trailing text is an error.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parts = text.split(SEPARATOR);
        let channel = parts.next().unwrap_or_default();
        let (timeframe, symbol) = match (parts.next(), parts.next(), parts.next()) {
            (Some(tf), Some(sym), None) => (tf, sym),
            _ => return Err(ParseError::TopicGrammar(text.to_string())),
        };
        if channel != KLINE_CHANNEL {
            return Err(ParseError::TopicGrammar(text.to_string()));
        }
        Ok(Self {
            timeframe: Timeframe::parse(timeframe)?,
            symbol: symbol.parse()?,
        })
    }

    /// Canonical encoding, used as the subscription key on the wire.
    pub fn encode(&self) -> String {
        format!(
            "{KLINE_CHANNEL}{SEPARATOR}{}{SEPARATOR}{}",
            self.timeframe, self.symbol
        )
    }
}

impl fmt::Display for SubscriptionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{KLINE_CHANNEL}{SEPARATOR}{}{SEPARATOR}{}",
            self.timeframe, self.symbol
        )
    }
}

impl FromStr for SubscriptionTopic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SubscriptionTopic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SubscriptionTopic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_topic_round_trips() {
        for text in [
            "klineV2.1.BTCUSD",
            "klineV2.1H.ETHUSD",
            "klineV2.1D.SOLUSDT",
            "klineV2.1W.XRPUSD",
        ] {
            let topic = SubscriptionTopic::parse(text).unwrap();
            assert_eq!(topic.encode(), text);
        }
    }

    #[test]
    fn non_canonical_interval_normalizes_on_parse() {
        let topic = SubscriptionTopic::parse("klineV2.60.BTCUSD").unwrap();
        assert_eq!(topic.encode(), "klineV2.1H.BTCUSD");
    }

    #[test]
    fn rejects_wrong_channel_and_shape() {
        for text in [
            "klineV3.1.BTCUSD",
            "klineV2.1",
            "klineV2",
            "",
            "klineV2.1.BTCUSD.extra",
            " klineV2.1.BTCUSD",
        ] {
            assert!(
                SubscriptionTopic::parse(text).is_err(),
                "expected rejection for {text:?}"
            );
        }
    }

    #[test]
    fn field_errors_propagate() {
        assert!(matches!(
            SubscriptionTopic::parse("klineV2.2H.BTCUSD"),
            Err(ParseError::TimeframeConstraint(_))
        ));
        assert!(matches!(
            SubscriptionTopic::parse("klineV2.1.NOPEUSD"),
            Err(ParseError::UnknownTradepair(_))
        ));
    }
}
