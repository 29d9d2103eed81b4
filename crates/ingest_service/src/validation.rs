//! Schema validation for inbound webhook bodies.
//!
//! The body is read as untyped JSON so every field problem can be reported at
//! once instead of failing on the first serde error.

use common::{normalize_symbol, normalize_timestamp, Signal, SignalAction, Timeframe};
use common::DEFAULT_SOURCE;
use serde::Serialize;
use serde_json::{Map, Value};

/// Minimum length of the shared secret field.
pub const MIN_SECRET_LEN: usize = 8;

/// One problem with one field of the webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// A schema-valid webhook. The symbol is still raw; see [`WebhookPayload::into_signal`].
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub action: SignalAction,
    pub price: Option<f64>,
    pub timestamp: String,
    pub secret: String,
    pub source: Option<String>,
}

impl WebhookPayload {
    /// Normalize into the queued signal shape.
    pub fn into_signal(self) -> Signal {
        Signal {
            symbol: normalize_symbol(&self.symbol),
            timeframe: self.timeframe,
            action: self.action,
            price: self.price,
            timestamp: self.timestamp,
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        }
    }
}

/// Validate a raw webhook body, collecting every field issue.
pub fn parse_webhook(raw: &[u8]) -> Result<WebhookPayload, Vec<FieldIssue>> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| vec![FieldIssue::new("body", format!("invalid JSON: {}", e))])?;
    let obj = value
        .as_object()
        .ok_or_else(|| vec![FieldIssue::new("body", "expected a JSON object")])?;

    let mut issues = Vec::new();

    let symbol = check_symbol(obj, &mut issues);
    let timeframe = check_timeframe(obj, &mut issues);
    let action = check_action(obj, &mut issues);
    let price = check_price(obj, &mut issues);
    let timestamp = check_timestamp(obj, &mut issues);
    let secret = check_secret(obj, &mut issues);
    let source = check_source(obj, &mut issues);

    match (symbol, timeframe, action, price, timestamp, secret, source) {
        (
            Some(symbol),
            Some(timeframe),
            Some(action),
            Ok(price),
            Some(timestamp),
            Some(secret),
            Ok(source),
        ) if issues.is_empty() => {
            Ok(WebhookPayload {
                symbol,
                timeframe,
                action,
                price,
                timestamp,
                secret,
                source,
            })
        }
        _ => Err(issues),
    }
}

/// Present and not JSON `null`.
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn check_symbol(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<String> {
    match field(obj, "symbol").and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => {
            if normalize_symbol(s).is_empty() {
                issues.push(FieldIssue::new("symbol", "has no instrument after normalization"));
                None
            } else {
                Some(s.to_string())
            }
        }
        _ => {
            issues.push(FieldIssue::new("symbol", "must be a non-empty string"));
            None
        }
    }
}

fn check_timeframe(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<Timeframe> {
    let parsed = field(obj, "timeframe")
        .and_then(Value::as_str)
        .and_then(|s| Timeframe::parse(s.trim()));
    if parsed.is_none() {
        let allowed: Vec<&str> = Timeframe::ALL.iter().map(Timeframe::as_str).collect();
        issues.push(FieldIssue::new(
            "timeframe",
            format!("must be one of {}", allowed.join(", ")),
        ));
    }
    parsed
}

fn check_action(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<SignalAction> {
    let parsed = field(obj, "action")
        .and_then(Value::as_str)
        .and_then(SignalAction::parse);
    if parsed.is_none() {
        issues.push(FieldIssue::new("action", "must be one of buy, sell"));
    }
    parsed
}

/// `Ok(None)` when absent; `Err(())` after recording an issue.
fn check_price(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Result<Option<f64>, ()> {
    let Some(raw) = field(obj, "price") else {
        return Ok(None);
    };
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(Some(p)),
        _ => {
            issues.push(FieldIssue::new("price", "must be a non-negative number"));
            Err(())
        }
    }
}

fn check_timestamp(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<String> {
    let normalized = field(obj, "timestamp").and_then(normalize_timestamp);
    if normalized.is_none() {
        issues.push(FieldIssue::new(
            "timestamp",
            "must be an ISO-8601 string or unix seconds/milliseconds",
        ));
    }
    normalized
}

fn check_secret(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<String> {
    match field(obj, "secret").and_then(Value::as_str) {
        Some(s) if s.chars().count() >= MIN_SECRET_LEN => Some(s.to_string()),
        _ => {
            issues.push(FieldIssue::new(
                "secret",
                format!("must be a string of at least {} characters", MIN_SECRET_LEN),
            ));
            None
        }
    }
}

fn check_source(
    obj: &Map<String, Value>,
    issues: &mut Vec<FieldIssue>,
) -> Result<Option<String>, ()> {
    match field(obj, "source") {
        None => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(_) => {
            issues.push(FieldIssue::new("source", "must be a string"));
            Err(())
        }
    }
}
