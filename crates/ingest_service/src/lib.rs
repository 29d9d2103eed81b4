//! Signal ingestion gateway library.
//!
//! Validates and authenticates third-party signal webhooks, de-duplicates
//! them with an idempotency key and pushes them onto the durable main queue.
//! Also serves read-only monitoring snapshots of the queues and feeds.
//!
//! # Example
//!
//! ```ignore
//! use ingest_service::{create_router, AppState, IngestConfig, Ingestor, Monitor};
//!
//! let store = Arc::new(RedisStore::connect(&redis_url, timeout).await?);
//! let state = AppState {
//!     ingestor: Ingestor::new(store.clone(), store.clone(), IngestConfig::default()),
//!     monitor: Monitor::new(store),
//! };
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod monitoring;
pub mod validation;

pub use api::{create_router, AppState};
pub use config::ServiceConfig;
pub use error::{IngestError, Result};
pub use ingest::{IngestConfig, IngestReceipt, Ingestor};
pub use monitoring::{Monitor, QueueDepths, RecentActivity};
pub use validation::{parse_webhook, FieldIssue, WebhookPayload};
