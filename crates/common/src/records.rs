//! Queue envelopes and feed records written by the pipeline stages.

use crate::signal::{Signal, SignalAction, Timeframe};
use serde::{Deserialize, Serialize};

/// Copy of an accepted signal pushed to the enqueued mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorEntry {
    #[serde(flatten)]
    pub signal: Signal,
    pub idempotency_key: String,
    pub enqueued_at: String,
}

/// Signal forwarded from the processing stage to the dispatch stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSignal {
    #[serde(flatten)]
    pub signal: Signal,
    pub processed_at: String,
    /// Routing receipts for the recipients resolved by the processing stage.
    #[serde(default)]
    pub deliveries: Vec<DeliveryRecord>,
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Routed to the dispatch stage, not yet sent.
    #[default]
    Queued,
    Sent,
    Failed,
}

/// One (signal, recipient) delivery. Append-only; feeds evict by trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub delivered_at: String,
    pub recipient_id: String,
    pub channel: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub action: SignalAction,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl DeliveryRecord {
    pub fn new(
        signal: &Signal,
        recipient_id: impl Into<String>,
        channel: impl Into<String>,
        status: DeliveryStatus,
        delivered_at: impl Into<String>,
    ) -> Self {
        Self {
            delivered_at: delivered_at.into(),
            recipient_id: recipient_id.into(),
            channel: channel.into(),
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe,
            action: signal.action,
            status,
        }
    }
}

/// Alarm entry shown to a subscriber whose subscription matched a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAlarm {
    /// `email|symbol|signal-timestamp`, stable across re-deliveries.
    pub id: String,
    pub email: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub action: SignalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub signal_timestamp: String,
    pub triggered_at: String,
}

impl TriggeredAlarm {
    pub fn alarm_id(email: &str, symbol: &str, signal_timestamp: &str) -> String {
        format!("{}|{}|{}", email, symbol, signal_timestamp)
    }

    pub fn new(email: &str, signal: &Signal, triggered_at: impl Into<String>) -> Self {
        Self {
            id: Self::alarm_id(email, &signal.symbol, &signal.timestamp),
            email: email.to_string(),
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe,
            action: signal.action,
            price: signal.price,
            signal_timestamp: signal.timestamp.clone(),
            triggered_at: triggered_at.into(),
        }
    }
}

fn default_active() -> bool {
    true
}

/// Alarm subscription owned by the configuration store (read-only here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub email: String,
    pub coin_symbol: String,
    /// `None` subscribes to both directions.
    #[serde(default)]
    pub action: Option<SignalAction>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Subscription {
    /// Exact symbol match on an active subscription, optionally on action too.
    pub fn matches(&self, signal: &Signal, match_action: bool) -> bool {
        if !self.is_active || self.coin_symbol != signal.symbol {
            return false;
        }
        if !match_action {
            return true;
        }
        self.action.map_or(true, |action| action == signal.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::DEFAULT_SOURCE;

    fn eth_sell() -> Signal {
        Signal {
            symbol: "ETHUSDT".to_string(),
            timeframe: Timeframe::M15,
            action: SignalAction::Sell,
            price: Some(2250.5),
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            source: DEFAULT_SOURCE.to_string(),
        }
    }

    fn subscription(symbol: &str, action: Option<SignalAction>, active: bool) -> Subscription {
        Subscription {
            email: "a@b.com".to_string(),
            coin_symbol: symbol.to_string(),
            action,
            is_active: active,
        }
    }

    #[test]
    fn test_subscription_matching() {
        let signal = eth_sell();
        assert!(subscription("ETHUSDT", Some(SignalAction::Sell), true).matches(&signal, true));
        assert!(!subscription("ETHUSDT", Some(SignalAction::Buy), true).matches(&signal, true));
        assert!(subscription("ETHUSDT", Some(SignalAction::Buy), true).matches(&signal, false));
        assert!(subscription("ETHUSDT", None, true).matches(&signal, true));
        assert!(!subscription("ETHUSDT", None, false).matches(&signal, true));
        assert!(!subscription("ETHUSD", None, true).matches(&signal, true));
    }

    #[test]
    fn test_alarm_id_is_deterministic() {
        let signal = eth_sell();
        let first = TriggeredAlarm::new("a@b.com", &signal, "2024-01-01T00:00:01.000Z");
        let second = TriggeredAlarm::new("a@b.com", &signal, "2024-01-01T00:05:00.000Z");
        assert_eq!(first.id, "a@b.com|ETHUSDT|2024-01-01T00:00:00.000Z");
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_processed_signal_flattens_signal_fields() {
        let processed = ProcessedSignal {
            signal: eth_sell(),
            processed_at: "2024-01-01T00:00:02.000Z".to_string(),
            deliveries: vec![],
        };
        let json = serde_json::to_value(&processed).unwrap();
        assert_eq!(json["symbol"], "ETHUSDT");
        assert_eq!(json["processedAt"], "2024-01-01T00:00:02.000Z");

        let back: ProcessedSignal = serde_json::from_value(json).unwrap();
        assert_eq!(back, processed);
    }

    #[test]
    fn test_subscription_row_defaults() {
        let row: Subscription =
            serde_json::from_str(r#"{"email":"a@b.com","coin_symbol":"BTCUSDT"}"#).unwrap();
        assert!(row.is_active);
        assert_eq!(row.action, None);
    }
}
