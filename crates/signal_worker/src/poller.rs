//! Generic queue-polling loop shared by the worker stages.
//!
//! The loop is parameterized by a [`StageHandler`] which names the queue it
//! drains and how a single payload is handled. Dequeues are non-blocking:
//! an empty queue or a failure is followed by a short sleep.

use crate::error::{Result, WorkerError};
use async_trait::async_trait;
use common::DurableQueue;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const DEPTH_REPORT_INTERVAL: Duration = Duration::from_secs(10);
const PAYLOAD_PREVIEW_CHARS: usize = 256;

/// One pipeline stage: which queue it drains and how a payload is handled.
#[async_trait]
pub trait StageHandler: Send + Sync + 'static {
    /// Stage label used in logs and metrics.
    const NAME: &'static str;

    /// Queue this stage consumes.
    const SOURCE_QUEUE: &'static str;

    /// Handle one dequeued payload.
    ///
    /// [`WorkerError::MalformedPayload`] means the entry is dropped; any other
    /// error is logged and triggers the error back-off.
    async fn handle(&self, payload: &str) -> Result<()>;
}

/// Sleep intervals of the polling loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay after finding the queue empty.
    pub idle_delay: Duration,
    /// Delay after a dequeue or processing failure.
    pub error_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(500),
            error_delay: Duration::from_millis(1500),
        }
    }
}

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Queue was empty.
    Idle,
    /// A payload was handled successfully.
    Processed,
    /// A payload could not be decoded and was dropped.
    Discarded,
    /// Dequeue or handling failed.
    Failed,
}

pub struct PollingWorker<H: StageHandler> {
    handler: H,
    queue: Arc<dyn DurableQueue>,
    config: PollConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<H: StageHandler> PollingWorker<H> {
    pub fn new(
        handler: H,
        queue: Arc<dyn DurableQueue>,
        config: PollConfig,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            handler,
            queue,
            config,
            shutdown_rx,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run until a shutdown signal arrives (or its sender is dropped).
    ///
    /// The shutdown channel is checked before every dequeue, so an entry is
    /// never taken off the queue once shutdown was requested.
    pub async fn run(mut self) {
        info!("[{}] worker started, polling '{}'", H::NAME, H::SOURCE_QUEUE);

        let mut last_depth_report: Option<Instant> = None;

        loop {
            match self.shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    info!("[{}] worker received shutdown signal", H::NAME);
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            if last_depth_report.map_or(true, |t| t.elapsed() >= DEPTH_REPORT_INTERVAL) {
                self.report_depth().await;
                last_depth_report = Some(Instant::now());
            }

            let delay = match self.poll_once().await {
                PollOutcome::Processed | PollOutcome::Discarded => continue,
                PollOutcome::Idle => self.config.idle_delay,
                PollOutcome::Failed => self.config.error_delay,
            };

            tokio::select! {
                biased;  // Prioritize shutdown signal

                _ = self.shutdown_rx.recv() => {
                    info!("[{}] worker received shutdown signal", H::NAME);
                    break;
                }

                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("[{}] worker stopped", H::NAME);
    }

    /// Dequeue and handle at most one payload.
    pub async fn poll_once(&self) -> PollOutcome {
        let payload = match self.queue.dequeue(H::SOURCE_QUEUE).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return PollOutcome::Idle,
            Err(e) => {
                error!("[{}] Failed to dequeue from '{}': {}", H::NAME, H::SOURCE_QUEUE, e);
                counter!(
                    "worker_errors_total",
                    "stage" => H::NAME,
                    "error_type" => "dequeue"
                )
                .increment(1);
                return PollOutcome::Failed;
            }
        };

        counter!("worker_payloads_received_total", "stage" => H::NAME).increment(1);

        match self.handler.handle(&payload).await {
            Ok(()) => {
                counter!("worker_payloads_processed_total", "stage" => H::NAME).increment(1);
                PollOutcome::Processed
            }
            Err(WorkerError::MalformedPayload(reason)) => {
                warn!(
                    "[{}] Discarding malformed payload: {} (payload: {})",
                    H::NAME,
                    reason,
                    preview(&payload)
                );
                counter!(
                    "worker_errors_total",
                    "stage" => H::NAME,
                    "error_type" => "malformed"
                )
                .increment(1);
                PollOutcome::Discarded
            }
            Err(e) => {
                error!(
                    "[{}] Failed to process payload: {} (payload: {})",
                    H::NAME,
                    e,
                    preview(&payload)
                );
                counter!(
                    "worker_errors_total",
                    "stage" => H::NAME,
                    "error_type" => e.kind()
                )
                .increment(1);
                PollOutcome::Failed
            }
        }
    }

    async fn report_depth(&self) {
        match self.queue.depth(H::SOURCE_QUEUE).await {
            Ok(depth) => {
                gauge!("worker_queue_depth", "queue" => H::SOURCE_QUEUE).set(depth as f64);
            }
            Err(e) => debug!("[{}] Could not read queue depth: {}", H::NAME, e),
        }
    }
}

fn preview(payload: &str) -> &str {
    match payload.char_indices().nth(PAYLOAD_PREVIEW_CHARS) {
        Some((end, _)) => &payload[..end],
        None => payload,
    }
}
