//! Queue and feed names shared by the gateway, the workers and the monitoring API.
//!
//! Work queues are consumed FIFO. Feeds are newest-first and trimmed on every
//! push, so they never grow past their bound.

/// Main work queue filled by the gateway.
pub const MAIN_QUEUE: &str = "signals:queue";

/// Queue between the processing and dispatch stages.
pub const PROCESSED_QUEUE: &str = "signals:processed";

/// Mirror of recently enqueued signals.
pub const ENQUEUED_MIRROR: &str = "signals:recent";
pub const ENQUEUED_MIRROR_LEN: usize = 100;

/// Mirror of recently processed signals.
pub const PROCESSED_MIRROR: &str = "signals:processed:recent";
pub const PROCESSED_MIRROR_LEN: usize = 100;

/// Admin-facing delivery feed.
pub const DELIVERY_FEED: &str = "notifications:deliveries";
pub const DELIVERY_FEED_LEN: usize = 200;

/// Subscriber-facing triggered-alarm feed.
pub const TRIGGERED_FEED: &str = "alarms:triggered";
pub const TRIGGERED_FEED_LEN: usize = 100;

/// Prefix for idempotency keys in the key-value store.
pub const IDEMPOTENCY_PREFIX: &str = "signal:idem:";

/// Default dedup window.
pub const DEFAULT_DEDUP_TTL_SECS: u64 = 300;
