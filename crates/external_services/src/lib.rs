//! Production clients for the pipeline's collaborators.
//!
//! - `RedisStore`: durable queue, bounded feeds and idempotency guard
//! - `HttpSubscriberDirectory`: read-only subscription lookups
//! - `HttpNotificationChannel` / `LogNotificationChannel`: outbound notifications
//!
//! # Example
//!
//! ```ignore
//! use external_services::RedisStore;
//! use common::{DurableQueue, IdempotencyGuard};
//!
//! let store = RedisStore::connect("redis://localhost:6379", DEFAULT_COMMAND_TIMEOUT).await?;
//! if store.try_acquire("BTCUSDT:1h:2024-01-01T00:00:00.000Z:buy", 300).await? {
//!     store.enqueue("signals:queue", &payload).await?;
//! }
//! ```

pub mod directory;
pub mod error;
pub mod notifier;
pub mod redis_client;

pub use directory::{HttpSubscriberDirectory, DEFAULT_SUBSCRIPTIONS_TABLE};
pub use error::{Error, Result};
pub use notifier::{HttpNotificationChannel, LogNotificationChannel};
pub use redis_client::{RedisStore, DEFAULT_COMMAND_TIMEOUT};
