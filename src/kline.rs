// =============================================================================
// Canonical candle shape + assembly from raw exchange records
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rest::RestKline;
use crate::timeframe::Timeframe;

/// A single OHLCV candle, normalized from either wire format.
///
/// `end = start + timeframe duration`; `confirmed` is true once the candle's
/// bucket has fully elapsed at the instant it was observed (a still-forming
/// candle is unconfirmed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
    pub observed_at: DateTime<Utc>,
    pub confirmed: bool,
}

/// Raw kline record as it appears inside a WebSocket data frame.
///
/// `start`/`end` are unix seconds, `timestamp` is unix microseconds, and
/// numeric fields arrive as JSON numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct WsKline {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub turnover: f64,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub timestamp: DateTime<Utc>,
    pub confirm: bool,
}

impl From<WsKline> for Candle {
    /// Live records carry their own end-time and confirm flag; both are
    /// trusted verbatim.
    fn from(raw: WsKline) -> Self {
        Self {
            start: raw.start,
            end: raw.end,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            turnover: raw.turnover,
            observed_at: raw.timestamp,
            confirmed: raw.confirm,
        }
    }
}

/// Assemble a canonical candle from a REST history row.
///
/// The row's start instant is trusted verbatim, even when it does not align
/// to a canonical bucket boundary.
pub fn assemble(row: &RestKline, timeframe: Timeframe, observed_at: DateTime<Utc>) -> Candle {
    let end = row.open_time + timeframe.duration();
    Candle {
        start: row.open_time,
        end,
        open: row.open,
        high: row.high,
        low: row.low,
        close: row.close,
        volume: row.volume,
        turnover: row.turnover,
        observed_at,
        confirmed: end < observed_at,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::tradepair::Tradepair;

    fn rest_row(open_time: DateTime<Utc>) -> RestKline {
        RestKline {
            symbol: Tradepair::BTCUSD,
            interval: Timeframe::parse("1").unwrap(),
            open_time,
            open: 47_000.0,
            high: 47_100.0,
            low: 46_900.0,
            close: 47_050.0,
            volume: 1_234.0,
            turnover: 0.0262,
        }
    }

    #[test]
    fn assemble_computes_end_from_timeframe() {
        let start = Utc.with_ymd_and_hms(2021, 9, 18, 22, 44, 0).unwrap();
        let candle = assemble(&rest_row(start), Timeframe::parse("1H").unwrap(), start);
        assert_eq!(candle.end, start + Duration::hours(1));
    }

    #[test]
    fn candle_elapsed_at_observation_is_confirmed() {
        let start = Utc.with_ymd_and_hms(2021, 9, 18, 22, 44, 0).unwrap();
        let tf = Timeframe::parse("1").unwrap();

        let candle = assemble(&rest_row(start), tf, start + Duration::seconds(61));
        assert!(candle.confirmed);

        let candle = assemble(&rest_row(start), tf, start + Duration::seconds(30));
        assert!(!candle.confirmed);
    }

    #[test]
    fn misaligned_start_is_not_realigned() {
        let start = Utc.with_ymd_and_hms(2021, 9, 18, 22, 44, 37).unwrap();
        let candle = assemble(&rest_row(start), Timeframe::parse("1").unwrap(), start);
        assert_eq!(candle.start, start);
        assert_eq!(candle.end, start + Duration::minutes(1));
    }

    #[test]
    fn ws_record_decodes_and_converts() {
        let json = r#"{
            "start": 1632103800,
            "end": 1632103860,
            "open": 47123.5,
            "close": 47150.0,
            "high": 47160.5,
            "low": 47100.0,
            "volume": 2108,
            "turnover": 0.04473237,
            "timestamp": 1632103838404989,
            "confirm": false
        }"#;
        let raw: WsKline = serde_json::from_str(json).unwrap();
        let candle = Candle::from(raw);

        assert_eq!(candle.start.timestamp(), 1_632_103_800);
        assert_eq!(candle.end.timestamp(), 1_632_103_860);
        assert_eq!(candle.observed_at.timestamp_micros(), 1_632_103_838_404_989);
        assert!(!candle.confirmed);
        assert!((candle.open - 47_123.5).abs() < f64::EPSILON);
    }
}
