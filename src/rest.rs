// =============================================================================
// Bybit public REST client — historical kline queries
// =============================================================================
//
// Only public endpoints are used, so no request signing is involved.  The
// multiplexer depends on the [`KlineFetcher`] trait rather than the concrete
// client so resync behavior can be tested without a network.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};

use crate::timeframe::Timeframe;
use crate::tradepair::Tradepair;

/// Production REST endpoint.
pub const MAINNET_REST_URL: &str = "https://api.bybit.com";
/// Testnet REST endpoint.
pub const TESTNET_REST_URL: &str = "https://api-testnet.bybit.com";

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const KLINE_RESOURCE: &str = "/v2/public/kline/list";

// -----------------------------------------------------------------------------
// Request / response shapes
// -----------------------------------------------------------------------------

/// Query for `GET /v2/public/kline/list`.
#[derive(Debug, Clone, Serialize)]
pub struct KlineRequest {
    pub symbol: Tradepair,
    pub interval: Timeframe,
    /// Start of the first requested candle.  Encoded as unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub from: DateTime<Utc>,
    /// Number of candles to return; the exchange accepts 0..=200.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// One history row.  OHLCV and turnover arrive as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestKline {
    pub symbol: Tradepair,
    pub interval: Timeframe,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub open_time: DateTime<Utc>,
    #[serde(deserialize_with = "f64_from_string")]
    pub open: f64,
    #[serde(deserialize_with = "f64_from_string")]
    pub high: f64,
    #[serde(deserialize_with = "f64_from_string")]
    pub low: f64,
    #[serde(deserialize_with = "f64_from_string")]
    pub close: f64,
    #[serde(deserialize_with = "f64_from_string")]
    pub volume: f64,
    #[serde(deserialize_with = "f64_from_string")]
    pub turnover: f64,
}

/// Envelope wrapping every v2 public REST response.
#[derive(Debug, Clone, Deserialize)]
pub struct RestEnvelope {
    pub ret_code: i64,
    pub ret_msg: String,
    pub ext_code: String,
    pub ext_info: String,
    pub result: Vec<RestKline>,
    /// Server clock at response time, as a fractional-second decimal string.
    #[serde(deserialize_with = "datetime_from_decimal_seconds")]
    pub time_now: DateTime<Utc>,
}

/// Decoded result of a kline query: the rows plus the server clock used as
/// the observation instant for assembled candles.
#[derive(Debug, Clone)]
pub struct KlinePage {
    pub result: Vec<RestKline>,
    pub time_now: DateTime<Utc>,
}

// -----------------------------------------------------------------------------
// Fetcher boundary
// -----------------------------------------------------------------------------

/// Source of historical klines.  The multiplexer only requires that the
/// response contain the one row whose `open_time` equals the requested
/// `from`.
#[async_trait]
pub trait KlineFetcher: Send + Sync {
    async fn kline(&self, request: &KlineRequest) -> Result<KlinePage>;
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// Configuration for [`BybitRestClient`].
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    pub testnet: bool,
    /// Custom base URL override (takes precedence over `testnet`).
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            testnet: true,
            base_url: None,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Bybit public REST API client.
#[derive(Debug, Clone)]
pub struct BybitRestClient {
    base_url: String,
    client: reqwest::Client,
}

impl BybitRestClient {
    pub fn new(config: RestClientConfig) -> Self {
        let base_url = config.base_url.unwrap_or_else(|| {
            if config.testnet {
                TESTNET_REST_URL.to_string()
            } else {
                MAINNET_REST_URL.to_string()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build reqwest client");

        debug!(base_url = %base_url, "BybitRestClient initialised");

        Self { base_url, client }
    }

    /// GET /v2/public/kline/list (public — no signature required).
    #[instrument(skip(self), name = "bybit::rest::kline")]
    pub async fn kline(&self, request: &KlineRequest) -> Result<KlinePage> {
        let url = format!("{}{KLINE_RESOURCE}", self.base_url);

        debug!(
            symbol = %request.symbol,
            interval = %request.interval,
            from = %request.from,
            limit = ?request.limit,
            "querying kline history"
        );

        let resp = self
            .client
            .get(&url)
            .query(request)
            .send()
            .await
            .with_context(|| format!("GET {KLINE_RESOURCE} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Bybit GET {KLINE_RESOURCE} returned {status}: {body}");
        }

        let envelope: RestEnvelope = resp
            .json()
            .await
            .context("failed to parse kline response")?;

        if envelope.ret_code != 0 {
            anyhow::bail!(
                "Bybit GET {KLINE_RESOURCE} returned ret_code {}: {} ({}/{})",
                envelope.ret_code,
                envelope.ret_msg,
                envelope.ext_code,
                envelope.ext_info
            );
        }

        debug!(rows = envelope.result.len(), "kline history fetched");
        Ok(KlinePage {
            result: envelope.result,
            time_now: envelope.time_now,
        })
    }
}

#[async_trait]
impl KlineFetcher for BybitRestClient {
    async fn kline(&self, request: &KlineRequest) -> Result<KlinePage> {
        BybitRestClient::kline(self, request).await
    }
}

// -----------------------------------------------------------------------------
// Serde helpers
// -----------------------------------------------------------------------------

/// The exchange encodes numeric values as JSON strings in REST rows; accept
/// a bare number too.
fn f64_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(f64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("failed to parse {s:?} as f64"))),
        StringOrNumber::Number(n) => Ok(n),
    }
}

/// `time_now` arrives as e.g. `"1632103862.919319"` — seconds with
/// microsecond precision.
fn datetime_from_decimal_seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let text = String::deserialize(deserializer)?;
    let seconds: f64 = text
        .parse()
        .map_err(|_| de::Error::custom(format!("failed to parse {text:?} as seconds")))?;
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {text:?}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
