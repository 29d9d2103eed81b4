//! Subscriber directory backed by a PostgREST-style table endpoint.
//!
//! Reads `GET {base}/rest/v1/{table}?coin_symbol=eq.{symbol}&is_active=eq.true`
//! and maps rows onto `Subscription`. The table is owned elsewhere; this client
//! never writes to it.

use crate::error::{Error, Result};
use async_trait::async_trait;
use common::{SignalAction, SubscriberDirectory, Subscription};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default table holding alarm subscriptions.
pub const DEFAULT_SUBSCRIPTIONS_TABLE: &str = "alarms";

/// Raw table row. `action` is free text in the store; unknown values match both sides.
#[derive(Debug, Deserialize)]
struct SubscriptionRow {
    email: String,
    coin_symbol: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            email: row.email,
            coin_symbol: row.coin_symbol,
            action: row.action.as_deref().and_then(SignalAction::parse),
            is_active: row.is_active.unwrap_or(true),
        }
    }
}

/// HTTP client for the subscription table.
#[derive(Debug, Clone)]
pub struct HttpSubscriberDirectory {
    http: reqwest::Client,
    base_url: String,
    table: String,
    api_key: Option<String>,
}

impl HttpSubscriberDirectory {
    pub fn new(
        base_url: impl Into<String>,
        table: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            table: table.into(),
            api_key,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    async fn fetch(&self, symbol: &str) -> Result<Vec<Subscription>> {
        let url = self.table_url();
        debug!("Fetching subscriptions for {} from: {}", symbol, url);

        let symbol_filter = format!("eq.{}", symbol);
        let mut request = self.http.get(&url).query(&[
            ("select", "email,coin_symbol,action,is_active"),
            ("coin_symbol", symbol_filter.as_str()),
            ("is_active", "eq.true"),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "API returned status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let rows: Vec<SubscriptionRow> = response.json().await?;
        Ok(rows
            .into_iter()
            .map(Subscription::from)
            .filter(|s| s.is_active && s.coin_symbol == symbol)
            .collect())
    }
}

#[async_trait]
impl SubscriberDirectory for HttpSubscriberDirectory {
    async fn find_active_subscriptions_by_symbol(
        &self,
        symbol: &str,
    ) -> common::Result<Vec<Subscription>> {
        Ok(self.fetch(symbol).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let directory = HttpSubscriberDirectory::new(
            "https://config.example.com/",
            DEFAULT_SUBSCRIPTIONS_TABLE,
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(directory.table_url(), "https://config.example.com/rest/v1/alarms");
    }

    #[test]
    fn test_row_mapping() {
        let rows: Vec<SubscriptionRow> = serde_json::from_str(
            r#"[
                {"email":"a@b.com","coin_symbol":"ETHUSDT","action":"SELL","is_active":true},
                {"email":"c@d.com","coin_symbol":"ETHUSDT","action":"both"},
                {"email":"e@f.com","coin_symbol":"ETHUSDT","action":null,"is_active":false}
            ]"#,
        )
        .unwrap();
        let subs: Vec<Subscription> = rows.into_iter().map(Subscription::from).collect();

        assert_eq!(subs[0].action, Some(SignalAction::Sell));
        assert_eq!(subs[1].action, None);
        assert!(subs[1].is_active);
        assert!(!subs[2].is_active);
    }
}
