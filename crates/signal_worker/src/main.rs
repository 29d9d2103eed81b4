//! Worker entry point.
//!
//! Runs the processing and dispatch stages as two independent loops over
//! the Redis queues until Ctrl+C.

use anyhow::{Context, Result};
use common::{DurableQueue, NotificationChannel, SubscriberDirectory};
use external_services::{
    HttpNotificationChannel, HttpSubscriberDirectory, LogNotificationChannel, RedisStore,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use signal_worker::{NotificationDispatcher, PollingWorker, SignalProcessor, WorkerConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting signal worker...");

    let config = WorkerConfig::from_env();

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;

    info!(
        "Prometheus metrics available at http://0.0.0.0:{}/metrics",
        config.metrics_port
    );

    info!("Connecting to Redis at {}...", config.redis_url);
    let queue: Arc<dyn DurableQueue> =
        Arc::new(RedisStore::connect(&config.redis_url, config.redis_timeout).await?);

    let subscriptions_url = config
        .subscriptions_url
        .clone()
        .context("SUBSCRIPTIONS_URL must be set")?;
    let directory: Arc<dyn SubscriberDirectory> = Arc::new(HttpSubscriberDirectory::new(
        subscriptions_url,
        config.subscriptions_table.clone(),
        config.subscriptions_api_key.clone(),
        config.http_timeout,
    )?);

    let channel: Arc<dyn NotificationChannel> = match &config.notify_url {
        Some(url) => Arc::new(HttpNotificationChannel::new(
            url.clone(),
            config.notify_api_key.clone(),
            config.notify_from.clone(),
            config.http_timeout,
        )?),
        None => {
            warn!("NOTIFY_URL not set - notifications will only be logged");
            Arc::new(LogNotificationChannel)
        }
    };

    if !config.match_action {
        info!("Action matching disabled - subscribers receive both buy and sell signals");
    }

    let (processor_tx, processor_rx) = mpsc::channel::<()>(1);
    let (dispatcher_tx, dispatcher_rx) = mpsc::channel::<()>(1);

    let processor = PollingWorker::new(
        SignalProcessor::new(queue.clone(), directory.clone(), config.match_action),
        queue.clone(),
        config.poll.clone(),
        processor_rx,
    );
    let dispatcher = PollingWorker::new(
        NotificationDispatcher::new(queue.clone(), directory, channel, config.match_action),
        queue,
        config.poll.clone(),
        dispatcher_rx,
    );

    let processor_handle = tokio::spawn(processor.run());
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    info!("Signal worker running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = processor_tx.send(()).await;
    let _ = dispatcher_tx.send(()).await;

    for (name, handle) in [("processor", processor_handle), ("dispatcher", dispatcher_handle)] {
        if let Err(e) = handle.await {
            error!("{} task failed: {}", name, e);
        }
    }

    info!("Signal worker stopped");
    Ok(())
}
