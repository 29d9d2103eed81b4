//! Common types, traits, and utilities for the signal pipeline.
//!
//! - `signal`: the normalized `Signal` and its validation helpers
//! - `records`: queue envelopes and feed records written by the workers
//! - `feeds`: queue/feed names and retention bounds
//! - `traits`: collaborator interfaces (queue, idempotency guard, directory, channel)
//! - `memory`: in-process implementations of those interfaces

pub mod config;
pub mod error;
pub mod feeds;
pub mod memory;
pub mod records;
pub mod signal;
pub mod traits;

pub use config::{env_flag, env_opt, env_or};
pub use error::{Error, Result};
pub use memory::{InMemoryStore, RecordingChannel, StaticDirectory};
pub use records::{
    DeliveryRecord, DeliveryStatus, MirrorEntry, ProcessedSignal, Subscription, TriggeredAlarm,
};
pub use signal::{
    idempotency_key, normalize_symbol, normalize_timestamp, now_rfc3339, Signal, SignalAction,
    Timeframe, DEFAULT_SOURCE,
};
pub use traits::{DurableQueue, IdempotencyGuard, NotificationChannel, SubscriberDirectory};
