//! Trading signal schema and the normalization rules applied at ingestion.

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Epoch values at or above this are read as milliseconds, below as seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Last year representable as a four-digit RFC3339 year.
const MAX_TIMESTAMP_YEAR: i32 = 9999;

/// Default signal source when the webhook does not name one.
pub const DEFAULT_SOURCE: &str = "tradingview";

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

/// Chart timeframe a signal was generated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Parse the wire representation (exact match, e.g. "15m").
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tf| tf.as_str() == value)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
        }
    }

    /// Case-insensitive parse ("BUY", "buy" and " Buy " are all accepted).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(SignalAction::Buy),
            "sell" => Some(SignalAction::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, normalized trading signal. Immutable once built by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    /// Normalized instrument symbol (e.g. "BTCUSDT").
    pub symbol: String,
    pub timeframe: Timeframe,
    pub action: SignalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// RFC3339 UTC timestamp with millisecond precision.
    pub timestamp: String,
    #[serde(default = "default_source")]
    pub source: String,
}

impl Signal {
    /// Deterministic dedup key for this signal.
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.symbol, self.timeframe, &self.timestamp, self.action)
    }
}

/// Build the idempotency key `symbol:timeframe:timestamp:action`.
pub fn idempotency_key(
    symbol: &str,
    timeframe: Timeframe,
    timestamp: &str,
    action: SignalAction,
) -> String {
    format!("{}:{}:{}:{}", symbol, timeframe, timestamp, action)
}

/// Strip the exchange prefix and pair separators from a symbol.
///
/// `BINANCE:BTCUSDT`, `BTC/USDT` and `btc-usdt` all become `BTCUSDT`.
/// Returns an empty string when nothing is left.
pub fn normalize_symbol(raw: &str) -> String {
    let without_exchange = raw.rsplit(':').next().unwrap_or(raw);
    without_exchange
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_') && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Normalize a webhook timestamp to `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Accepts RFC3339 / ISO-8601 strings (offset-less values are UTC), unix
/// seconds and unix milliseconds, either as JSON numbers or numeric strings.
pub fn normalize_timestamp(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().and_then(epoch_to_rfc3339),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_decimal(s) {
                return s.parse::<f64>().ok().and_then(epoch_to_rfc3339);
            }
            parse_iso8601(s).and_then(format_in_range)
        }
        _ => None,
    }
}

/// Current time in the pipeline's timestamp format.
pub fn now_rfc3339() -> String {
    format_utc(Utc::now())
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Formats only instants whose year fits the four-digit RFC3339 form.
fn format_in_range(dt: DateTime<Utc>) -> Option<String> {
    (dt.year() <= MAX_TIMESTAMP_YEAR).then(|| format_utc(dt))
}

/// Plain digits with at most one decimal point; no sign, exponent or `inf`/`NaN`.
fn is_decimal(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && s.bytes().filter(|&b| b == b'.').count() <= 1
}

fn epoch_to_rfc3339(epoch: f64) -> Option<String> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    let millis = if epoch >= EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };
    DateTime::<Utc>::from_timestamp_millis(millis.round() as i64).and_then(format_in_range)
}

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
