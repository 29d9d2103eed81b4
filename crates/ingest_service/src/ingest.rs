//! The ingestion pipeline: validate, authenticate, normalize, dedup, enqueue.

use crate::error::{IngestError, Result};
use crate::validation::parse_webhook;
use common::feeds::{DEFAULT_DEDUP_TTL_SECS, ENQUEUED_MIRROR, ENQUEUED_MIRROR_LEN, MAIN_QUEUE};
use common::{
    now_rfc3339, DurableQueue, IdempotencyGuard, MirrorEntry, Signal, SignalAction, Timeframe,
};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Gateway settings.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Shared webhook secret. `None` rejects every webhook.
    pub webhook_secret: Option<String>,
    /// Dedup window in seconds.
    pub dedup_ttl_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            dedup_ttl_secs: DEFAULT_DEDUP_TTL_SECS,
        }
    }
}

impl IngestConfig {
    /// Dedup window actually applied; never shorter than one second.
    pub fn effective_dedup_ttl_secs(&self) -> u64 {
        self.dedup_ttl_secs.max(1)
    }
}

/// Successful ingestion, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub idempotency_key: String,
    pub normalized_symbol: String,
    pub timeframe: Timeframe,
    pub action: SignalAction,
    pub timestamp: String,
}

/// Ingestion gateway. Holds no mutable state of its own; the queue and the
/// guard are the only shared resources.
#[derive(Clone)]
pub struct Ingestor {
    queue: Arc<dyn DurableQueue>,
    guard: Arc<dyn IdempotencyGuard>,
    config: IngestConfig,
}

fn outcome(label: &'static str) {
    counter!("ingest_signals_total", "outcome" => label).increment(1);
}

impl Ingestor {
    pub fn new(
        queue: Arc<dyn DurableQueue>,
        guard: Arc<dyn IdempotencyGuard>,
        config: IngestConfig,
    ) -> Self {
        Self {
            queue,
            guard,
            config,
        }
    }

    /// Ingest a raw webhook body.
    ///
    /// Validation runs before the secret check so malformed requests never
    /// reach the comparison.
    pub async fn ingest(&self, raw_body: &[u8]) -> Result<IngestReceipt> {
        let payload = parse_webhook(raw_body).map_err(|issues| {
            outcome("invalid");
            debug!("Rejected webhook with {} issue(s)", issues.len());
            IngestError::Validation(issues)
        })?;

        if let Err(e) = self.authenticate(&payload.secret) {
            outcome("unauthorized");
            warn!("Rejected webhook for {} with invalid secret", payload.symbol);
            return Err(e);
        }

        let signal = payload.into_signal();
        let key = signal.idempotency_key();

        if !self.acquire(&key).await {
            outcome("duplicate");
            info!("Duplicate signal {}", key);
            return Err(IngestError::Duplicate(key));
        }

        self.enqueue(&signal, &key).await?;

        outcome("accepted");
        info!("Enqueued signal {}", key);

        Ok(IngestReceipt {
            idempotency_key: key,
            normalized_symbol: signal.symbol,
            timeframe: signal.timeframe,
            action: signal.action,
            timestamp: signal.timestamp,
        })
    }

    fn authenticate(&self, secret: &str) -> Result<()> {
        match &self.config.webhook_secret {
            Some(expected) if expected == secret => Ok(()),
            Some(_) => Err(IngestError::InvalidSecret),
            None => {
                error!("WEBHOOK_SECRET is not configured; rejecting webhook");
                Err(IngestError::InvalidSecret)
            }
        }
    }

    /// Claim the idempotency key. Fails open when the store is unreachable.
    async fn acquire(&self, key: &str) -> bool {
        match self.guard.try_acquire(key, self.config.effective_dedup_ttl_secs()).await {
            Ok(acquired) => acquired,
            Err(e) => {
                counter!("ingest_idempotency_fail_open_total").increment(1);
                warn!(
                    "Idempotency store unavailable, accepting {} without dedup: {}",
                    key, e
                );
                true
            }
        }
    }

    /// Push to the main queue, then mirror regardless of the push outcome.
    async fn enqueue(&self, signal: &Signal, key: &str) -> Result<()> {
        let payload = serde_json::to_string(signal)?;
        let pushed = self.queue.enqueue(MAIN_QUEUE, &payload).await;

        self.mirror(signal, key).await;

        if let Err(e) = pushed {
            error!("Failed to enqueue signal {}: {}", key, e);
            if let Err(release_err) = self.guard.release(key).await {
                warn!("Failed to release idempotency key {}: {}", key, release_err);
            }
            return Err(IngestError::Dependency(e));
        }
        Ok(())
    }

    async fn mirror(&self, signal: &Signal, key: &str) {
        let entry = MirrorEntry {
            signal: signal.clone(),
            idempotency_key: key.to_string(),
            enqueued_at: now_rfc3339(),
        };
        let result = match serde_json::to_string(&entry) {
            Ok(json) => self
                .queue
                .mirror(ENQUEUED_MIRROR, &json, ENQUEUED_MIRROR_LEN)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            counter!("ingest_mirror_failures_total").increment(1);
            warn!("Mirror write for {} failed (ignored): {}", key, e);
        }
    }
}
