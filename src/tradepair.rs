// =============================================================================
// Tradepair — closed enumeration of supported Bybit instruments
// =============================================================================
//
// The reference list was taken from `GET /v2/public/symbols`, dropping the
// dated futures contracts.  Parsing is an exact match against the wire name;
// no partial or case-insensitive matching.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

macro_rules! tradepairs {
    ($($name:ident),+ $(,)?) => {
        /// A supported instrument identifier.  Variant names are the exact
        /// wire names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Tradepair {
            $($name,)+
        }

        impl Tradepair {
            /// All supported instruments, in reference-list order.
            pub const ALL: &'static [Tradepair] = &[$(Tradepair::$name,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Tradepair::$name => stringify!($name),)+
                }
            }
        }

        impl FromStr for Tradepair {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($name) => Ok(Tradepair::$name),)+
                    _ => Err(ParseError::UnknownTradepair(s.to_string())),
                }
            }
        }
    };
}

tradepairs! {
    BTCUSD,
    ETHUSD,
    EOSUSD,
    XRPUSD,
    BTCUSDT,
    ETHUSDT,
    AXSUSDT,
    XRPUSDT,
    DOGEUSDT,
    EOSUSDT,
    THETAUSDT,
    TRXUSDT,
    COMPUSDT,
    XLMUSDT,
    ADAUSDT,
    DOTUSDT,
    BNBUSDT,
    LTCUSDT,
    ETCUSDT,
    MATICUSDT,
    LINKUSDT,
    AAVEUSDT,
    BCHUSDT,
    SOLUSDT,
    UNIUSDT,
    FILUSDT,
    SUSHIUSDT,
    XTZUSDT,
    XEMUSDT,
}

impl fmt::Display for Tradepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pair_round_trips_through_its_wire_name() {
        for pair in Tradepair::ALL {
            assert_eq!(pair.as_str().parse::<Tradepair>().unwrap(), *pair);
        }
    }

    #[test]
    fn rejects_unknown_and_inexact_names() {
        for text in ["btcusd", "BTC", "BTCUSD ", "BTCUSDX", ""] {
            assert!(
                matches!(
                    text.parse::<Tradepair>(),
                    Err(ParseError::UnknownTradepair(_))
                ),
                "expected rejection for {text:?}"
            );
        }
    }

    #[test]
    fn serde_uses_the_wire_name() {
        assert_eq!(
            serde_json::to_string(&Tradepair::BTCUSD).unwrap(),
            "\"BTCUSD\""
        );
        let pair: Tradepair = serde_json::from_str("\"SOLUSDT\"").unwrap();
        assert_eq!(pair, Tradepair::SOLUSDT);
    }
}
