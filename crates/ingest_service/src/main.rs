//! Ingestion service entry point.
//!
//! Accepts signal webhooks, de-duplicates them and enqueues them in Redis.
//! Exposes monitoring endpoints over the queues and feeds.

use anyhow::Result;
use external_services::RedisStore;
use ingest_service::{create_router, AppState, Ingestor, Monitor, ServiceConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{info, warn};
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

    info!("Starting ingest service...");

    let config = ServiceConfig::from_env();

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;

    info!(
        "Prometheus metrics available at http://0.0.0.0:{}/metrics",
        config.metrics_port
    );

    if config.ingest.webhook_secret.is_none() {
        warn!("WEBHOOK_SECRET not set - every webhook will be rejected with 401");
    }

    info!("Connecting to Redis at {}...", config.redis_url);
    let store = Arc::new(RedisStore::connect(&config.redis_url, config.redis_timeout).await?);

    let app_state = AppState {
        ingestor: Ingestor::new(store.clone(), store.clone(), config.ingest.clone()),
        monitor: Monitor::new(store),
    };
    let router = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    info!("HTTP API listening on http://0.0.0.0:{}", config.http_port);
    info!("Available endpoints:");
    info!("  POST /signals/tradingview     - Ingest a signal webhook");
    info!("  GET  /monitoring/queues       - Queue and feed lengths");
    info!("  GET  /monitoring/queue        - Peek the main queue");
    info!("  GET  /monitoring/recent       - Recent enqueued/processed/delivered");
    info!("  GET  /monitoring/triggered    - Triggered alarms");
    info!("  GET  /health                  - Health check");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Ingest service stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
}
