//! Second stage: turn processed signals into triggered alarms and
//! per-recipient notifications.
//!
//! Feed writes are best-effort. A failed send is recorded with status
//! `failed` and does not stop delivery to the remaining recipients.

use crate::error::{Result, WorkerError};
use crate::poller::StageHandler;
use crate::processor::matching_recipients;
use async_trait::async_trait;
use common::feeds::{
    DELIVERY_FEED, DELIVERY_FEED_LEN, PROCESSED_QUEUE, TRIGGERED_FEED, TRIGGERED_FEED_LEN,
};
use common::{
    now_rfc3339, DeliveryRecord, DeliveryStatus, DurableQueue, NotificationChannel,
    ProcessedSignal, Signal, SubscriberDirectory, TriggeredAlarm,
};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-signal delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct NotificationDispatcher {
    queue: Arc<dyn DurableQueue>,
    directory: Arc<dyn SubscriberDirectory>,
    channel: Arc<dyn NotificationChannel>,
    match_action: bool,
}

impl NotificationDispatcher {
    pub fn new(
        queue: Arc<dyn DurableQueue>,
        directory: Arc<dyn SubscriberDirectory>,
        channel: Arc<dyn NotificationChannel>,
        match_action: bool,
    ) -> Self {
        Self {
            queue,
            directory,
            channel,
            match_action,
        }
    }

    /// Deliver one processed signal to every matching subscriber.
    ///
    /// Recipients are re-read from the directory so that subscriptions
    /// changed after the processing stage are honoured.
    pub async fn dispatch(&self, processed: &ProcessedSignal) -> Result<DispatchSummary> {
        let signal = &processed.signal;
        let subscriptions = self
            .directory
            .find_active_subscriptions_by_symbol(&signal.symbol)
            .await?;
        let recipients = matching_recipients(&subscriptions, signal, self.match_action);

        if recipients.is_empty() {
            info!(
                "[dispatcher] No active subscriptions for {} {}",
                signal.symbol, signal.action
            );
            return Ok(DispatchSummary::default());
        }

        let mut summary = DispatchSummary {
            matched: recipients.len(),
            ..Default::default()
        };

        for email in &recipients {
            match self.deliver(email, signal).await {
                DeliveryStatus::Failed => summary.failed += 1,
                _ => summary.sent += 1,
            }
        }

        info!(
            "[dispatcher] {} {} {}: {} sent, {} failed",
            signal.symbol, signal.timeframe, signal.action, summary.sent, summary.failed
        );

        Ok(summary)
    }

    async fn deliver(&self, email: &str, signal: &Signal) -> DeliveryStatus {
        let now = now_rfc3339();

        let alarm = TriggeredAlarm::new(email, signal, now.as_str());
        self.push_feed(TRIGGERED_FEED, TRIGGERED_FEED_LEN, &alarm).await;

        let status = match self.channel.send(email, signal).await {
            Ok(()) => {
                counter!(
                    "notifications_total",
                    "channel" => self.channel.name(),
                    "status" => "sent"
                )
                .increment(1);
                DeliveryStatus::Sent
            }
            Err(e) => {
                warn!(
                    "[dispatcher] {} notification to {} failed: {}",
                    self.channel.name(),
                    email,
                    e
                );
                counter!(
                    "notifications_total",
                    "channel" => self.channel.name(),
                    "status" => "failed"
                )
                .increment(1);
                DeliveryStatus::Failed
            }
        };

        let record = DeliveryRecord::new(signal, email, self.channel.name(), status, now);
        self.push_feed(DELIVERY_FEED, DELIVERY_FEED_LEN, &record).await;

        status
    }

    async fn push_feed<T: Serialize>(&self, feed: &'static str, max_len: usize, entry: &T) {
        let result = match serde_json::to_string(entry) {
            Ok(payload) => self
                .queue
                .mirror(feed, &payload, max_len)
                .await
                .map_err(WorkerError::from),
            Err(e) => Err(WorkerError::from(e)),
        };
        if let Err(e) = result {
            warn!("[dispatcher] Failed to write '{}' entry: {}", feed, e);
            counter!("worker_mirror_failures_total", "feed" => feed).increment(1);
        }
    }
}

#[async_trait]
impl StageHandler for NotificationDispatcher {
    const NAME: &'static str = "dispatcher";
    const SOURCE_QUEUE: &'static str = PROCESSED_QUEUE;

    async fn handle(&self, payload: &str) -> Result<()> {
        let processed: ProcessedSignal = serde_json::from_str(payload)
            .map_err(|e| WorkerError::MalformedPayload(e.to_string()))?;
        self.dispatch(&processed).await.map(|_| ())
    }
}
