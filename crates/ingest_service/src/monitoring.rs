//! Read-only snapshots of the queues and feeds for the admin API.
//!
//! Nothing here is authoritative: lengths and entries may change between two
//! reads, and entries that fail to decode are skipped.

use common::feeds::{
    DELIVERY_FEED, ENQUEUED_MIRROR, MAIN_QUEUE, PROCESSED_MIRROR, PROCESSED_QUEUE,
    TRIGGERED_FEED, TRIGGERED_FEED_LEN,
};
use common::{DeliveryRecord, DurableQueue, MirrorEntry, ProcessedSignal, Signal, TriggeredAlarm};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Default number of entries returned by list endpoints.
pub const DEFAULT_LIMIT: usize = 10;

/// Upper bound on entries returned by list endpoints.
pub const MAX_LIMIT: usize = 200;

/// Lengths of every queue and feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDepths {
    pub main: usize,
    pub processed: usize,
    pub enqueued_mirror: usize,
    pub processed_mirror: usize,
    pub deliveries: usize,
    pub triggered: usize,
}

/// Most recent activity at each pipeline stage, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    pub enqueued: Vec<MirrorEntry>,
    pub processed: Vec<ProcessedSignal>,
    pub delivered: Vec<DeliveryRecord>,
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Clone)]
pub struct Monitor {
    queue: Arc<dyn DurableQueue>,
}

impl Monitor {
    pub fn new(queue: Arc<dyn DurableQueue>) -> Self {
        Self { queue }
    }

    pub async fn queue_depths(&self) -> common::Result<QueueDepths> {
        Ok(QueueDepths {
            main: self.queue.depth(MAIN_QUEUE).await?,
            processed: self.queue.depth(PROCESSED_QUEUE).await?,
            enqueued_mirror: self.queue.depth(ENQUEUED_MIRROR).await?,
            processed_mirror: self.queue.depth(PROCESSED_MIRROR).await?,
            deliveries: self.queue.depth(DELIVERY_FEED).await?,
            triggered: self.queue.depth(TRIGGERED_FEED).await?,
        })
    }

    /// Newest `limit` signals still waiting on the main queue.
    pub async fn peek_main(&self, limit: usize) -> common::Result<Vec<Signal>> {
        self.read(MAIN_QUEUE, limit).await
    }

    pub async fn recent(&self, limit: usize) -> common::Result<RecentActivity> {
        Ok(RecentActivity {
            enqueued: self.read(ENQUEUED_MIRROR, limit).await?,
            processed: self.read(PROCESSED_MIRROR, limit).await?,
            delivered: self.read(DELIVERY_FEED, limit).await?,
        })
    }

    /// Triggered alarms, newest first, one entry per alarm id.
    ///
    /// The queue is at-least-once, so the same alarm can appear twice in the
    /// feed; the deterministic id collapses those here.
    pub async fn triggered(
        &self,
        email: Option<&str>,
        limit: usize,
    ) -> common::Result<Vec<TriggeredAlarm>> {
        let alarms: Vec<TriggeredAlarm> = self.read(TRIGGERED_FEED, TRIGGERED_FEED_LEN).await?;
        let mut seen = HashSet::new();
        Ok(alarms
            .into_iter()
            .filter(|a| email.map_or(true, |e| a.email == e))
            .filter(|a| seen.insert(a.id.clone()))
            .take(limit)
            .collect())
    }

    async fn read<T: DeserializeOwned>(&self, list: &str, limit: usize) -> common::Result<Vec<T>> {
        let raw = self.queue.peek(list, limit).await?;
        Ok(raw
            .iter()
            .filter_map(|entry| match serde_json::from_str(entry) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!("Skipping undecodable entry on '{}': {}", list, e);
                    None
                }
            })
            .collect())
    }
}
