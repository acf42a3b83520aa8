// =============================================================================
// Timeframe notation — Bybit's compact interval strings
// =============================================================================
//
// Grammar: `^[1-9][0-9]*[HDW]?$` (whole input, no whitespace).  Alternatives
// are tried week → day → hour → minute; minutes carry no suffix so they are
// matched last.  Only a restricted subset of Bybit's intervals is supported:
// minutes ∈ {1, 60}, hours/days/weeks quantity must be 1.
//
// Values are always stored in canonical form: the greatest unit that evenly
// divides the duration in minutes ("60" decodes to 1 hour).  Encoding a
// canonical value is the exact inverse of decoding it.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

const MINUTES_IN_HOUR: u32 = 60;
const MINUTES_IN_DAY: u32 = 60 * 24;
const MINUTES_IN_WEEK: u32 = 60 * 24 * 7;

/// Time unit of a kline interval.  Monthly intervals are intentionally
/// unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeframeUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl TimeframeUnit {
    /// Suffix character in the wire notation; minutes are bare numerals.
    fn suffix(self) -> &'static str {
        match self {
            Self::Minute => "",
            Self::Hour => "H",
            Self::Day => "D",
            Self::Week => "W",
        }
    }

    fn minutes(self) -> u32 {
        match self {
            Self::Minute => 1,
            Self::Hour => MINUTES_IN_HOUR,
            Self::Day => MINUTES_IN_DAY,
            Self::Week => MINUTES_IN_WEEK,
        }
    }
}

/// A supported kline interval, always held in canonical greatest-unit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeframe {
    quantity: u32,
    unit: TimeframeUnit,
}

impl Timeframe {
    /// Validate `quantity` against the supported set for `unit`, then
    /// canonicalize.  `Timeframe::new(60, Minute)` yields the same value as
    /// `Timeframe::new(1, Hour)`.
    pub fn new(quantity: u32, unit: TimeframeUnit) -> Result<Self, ParseError> {
        let supported = match unit {
            TimeframeUnit::Minute => quantity == 1 || quantity == 60,
            TimeframeUnit::Hour | TimeframeUnit::Day | TimeframeUnit::Week => quantity == 1,
        };
        if !supported {
            return Err(ParseError::TimeframeConstraint(format!(
                "{quantity}{}",
                unit.suffix()
            )));
        }
        Ok(Self::with_greatest_unit(quantity * unit.minutes()))
    }

    /// Parse the compact notation, e.g. `"1"`, `"60"`, `"1H"`, `"1D"`, `"1W"`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let (digits, unit) = match text.as_bytes().last() {
            Some(b'W') => (&text[..text.len() - 1], TimeframeUnit::Week),
            Some(b'D') => (&text[..text.len() - 1], TimeframeUnit::Day),
            Some(b'H') => (&text[..text.len() - 1], TimeframeUnit::Hour),
            _ => (text, TimeframeUnit::Minute),
        };

        // Whole numeral, no leading zero, no sign, no decimal point.
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || digits.starts_with('0')
        {
            return Err(ParseError::TimeframeGrammar(text.to_string()));
        }
        let quantity: u32 = digits
            .parse()
            .map_err(|_| ParseError::TimeframeGrammar(text.to_string()))?;

        Self::new(quantity, unit)
            .map_err(|_| ParseError::TimeframeConstraint(text.to_string()))
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit(&self) -> TimeframeUnit {
        self.unit
    }

    /// Total duration in minutes.
    pub fn minutes(&self) -> u32 {
        self.quantity * self.unit.minutes()
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes()))
    }

    /// Represent `minutes` with the greatest unit that divides it evenly.
    fn with_greatest_unit(minutes: u32) -> Self {
        if minutes % MINUTES_IN_WEEK == 0 {
            Self {
                quantity: minutes / MINUTES_IN_WEEK,
                unit: TimeframeUnit::Week,
            }
        } else if minutes % MINUTES_IN_DAY == 0 {
            Self {
                quantity: minutes / MINUTES_IN_DAY,
                unit: TimeframeUnit::Day,
            }
        } else if minutes % MINUTES_IN_HOUR == 0 {
            Self {
                quantity: minutes / MINUTES_IN_HOUR,
                unit: TimeframeUnit::Hour,
            }
        } else {
            Self {
                quantity: minutes,
                unit: TimeframeUnit::Minute,
            }
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.quantity, self.unit.suffix())
    }
}

impl FromStr for Timeframe {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Wire form is the encoded string, both over REST and WebSocket.
impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
