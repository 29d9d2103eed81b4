//! Notification channels.
//!
//! `HttpNotificationChannel` posts a transactional email request to a relay
//! (`{from, to, subject, text}`); `LogNotificationChannel` only logs and is used
//! when no relay is configured.

use crate::error::{Error, Result};
use async_trait::async_trait;
use common::{NotificationChannel, Signal};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
}

fn subject_line(signal: &Signal) -> String {
    format!(
        "{} {} signal ({})",
        signal.symbol,
        signal.action.as_str().to_uppercase(),
        signal.timeframe
    )
}

fn body_text(signal: &Signal) -> String {
    let price = signal
        .price
        .map(|p| p.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Your alarm for {} was triggered.\n\n\
         Action: {}\nTimeframe: {}\nPrice: {}\nSignal time: {}\n",
        signal.symbol, signal.action, signal.timeframe, price, signal.timestamp
    )
}

/// Email relay client.
#[derive(Debug, Clone)]
pub struct HttpNotificationChannel {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpNotificationChannel {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            api_key,
            from: from.into(),
        })
    }

    async fn post(&self, recipient: &str, signal: &Signal) -> Result<()> {
        let body = EmailRequest {
            from: &self.from,
            to: vec![recipient],
            subject: subject_line(signal),
            text: body_text(signal),
        };

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "Relay returned status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        debug!("Sent {} notification to {}", signal.symbol, recipient);
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for HttpNotificationChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, recipient: &str, signal: &Signal) -> common::Result<()> {
        self.post(recipient, signal)
            .await
            .map_err(|e| common::Error::Notification(e.to_string()))
    }
}

/// Channel that only logs what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, recipient: &str, signal: &Signal) -> common::Result<()> {
        info!("[notify] {} -> {}", subject_line(signal), recipient);
        Ok(())
    }
}
