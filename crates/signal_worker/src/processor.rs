//! First stage: validate queued signals, resolve recipients and forward
//! them to the processed queue.

use crate::error::{Result, WorkerError};
use crate::poller::StageHandler;
use async_trait::async_trait;
use common::feeds::{MAIN_QUEUE, PROCESSED_MIRROR, PROCESSED_MIRROR_LEN, PROCESSED_QUEUE};
use common::{
    now_rfc3339, DeliveryRecord, DeliveryStatus, DurableQueue, ProcessedSignal, Signal,
    SubscriberDirectory, Subscription,
};
use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Channel recorded on routing receipts written by this stage.
pub const ROUTING_CHANNEL: &str = "queue";

pub struct SignalProcessor {
    queue: Arc<dyn DurableQueue>,
    directory: Arc<dyn SubscriberDirectory>,
    match_action: bool,
}

impl SignalProcessor {
    pub fn new(
        queue: Arc<dyn DurableQueue>,
        directory: Arc<dyn SubscriberDirectory>,
        match_action: bool,
    ) -> Self {
        Self {
            queue,
            directory,
            match_action,
        }
    }

    /// Route one signal and forward it to the dispatch stage.
    pub async fn process(&self, signal: Signal) -> Result<ProcessedSignal> {
        let subscriptions = self
            .directory
            .find_active_subscriptions_by_symbol(&signal.symbol)
            .await?;
        let recipients = matching_recipients(&subscriptions, &signal, self.match_action);

        let processed_at = now_rfc3339();
        let deliveries = recipients
            .iter()
            .map(|email| {
                DeliveryRecord::new(
                    &signal,
                    email.as_str(),
                    ROUTING_CHANNEL,
                    DeliveryStatus::Queued,
                    processed_at.as_str(),
                )
            })
            .collect();

        let processed = ProcessedSignal {
            signal,
            processed_at,
            deliveries,
        };
        let payload = serde_json::to_string(&processed)?;

        self.queue.enqueue(PROCESSED_QUEUE, &payload).await?;

        if let Err(e) = self
            .queue
            .mirror(PROCESSED_MIRROR, &payload, PROCESSED_MIRROR_LEN)
            .await
        {
            warn!("[processor] Failed to mirror processed signal: {}", e);
            counter!("worker_mirror_failures_total", "feed" => PROCESSED_MIRROR).increment(1);
        }

        info!(
            "[processor] {} {} {} routed to {} recipient(s)",
            processed.signal.symbol,
            processed.signal.timeframe,
            processed.signal.action,
            recipients.len()
        );

        Ok(processed)
    }
}

#[async_trait]
impl StageHandler for SignalProcessor {
    const NAME: &'static str = "processor";
    const SOURCE_QUEUE: &'static str = MAIN_QUEUE;

    async fn handle(&self, payload: &str) -> Result<()> {
        let signal: Signal = serde_json::from_str(payload)
            .map_err(|e| WorkerError::MalformedPayload(e.to_string()))?;
        self.process(signal).await.map(|_| ())
    }
}

/// Distinct emails of the subscriptions matching `signal`, in directory order.
pub(crate) fn matching_recipients(
    subscriptions: &[Subscription],
    signal: &Signal,
    match_action: bool,
) -> Vec<String> {
    let mut seen = HashSet::new();
    subscriptions
        .iter()
        .filter(|s| s.matches(signal, match_action))
        .filter(|s| seen.insert(s.email.clone()))
        .map(|s| s.email.clone())
        .collect()
}
