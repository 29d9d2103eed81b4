//! Collaborator interfaces the gateway and workers are written against.
//!
//! Production implementations live in `external_services`; `crate::memory`
//! provides in-process ones for tests and local runs.

use crate::error::Result;
use crate::records::Subscription;
use crate::signal::Signal;
use async_trait::async_trait;

/// Ordered, persistent lists used both as work queues and as bounded feeds.
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Append a payload to a work queue.
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<()>;

    /// Pop the oldest payload. Never blocks: an empty queue yields `None`.
    async fn dequeue(&self, queue: &str) -> Result<Option<String>>;

    /// Push to the head of a feed and trim it to the newest `max_len` entries.
    async fn mirror(&self, feed: &str, payload: &str, max_len: usize) -> Result<()>;

    /// Current number of entries in a queue or feed.
    async fn depth(&self, queue: &str) -> Result<usize>;

    /// Newest `limit` entries, most recent first. Non-destructive.
    async fn peek(&self, queue: &str, limit: usize) -> Result<Vec<String>>;
}

/// Conditional "set if absent, with expiry" against a shared key-value store.
#[async_trait]
pub trait IdempotencyGuard: Send + Sync {
    /// `true` only for the first caller within `ttl_secs` for `key`.
    async fn try_acquire(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// Drop a previously acquired key.
    async fn release(&self, key: &str) -> Result<()>;
}

/// Read-only view of alarm subscriptions in the configuration store.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Active subscriptions whose `coin_symbol` equals `symbol` exactly.
    async fn find_active_subscriptions_by_symbol(&self, symbol: &str)
        -> Result<Vec<Subscription>>;
}

/// Outbound notification transport (email relay, log, ...).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel label recorded on delivery records.
    fn name(&self) -> &'static str;

    async fn send(&self, recipient: &str, signal: &Signal) -> Result<()>;
}
