//! Environment configuration for the ingestion service.

use crate::ingest::IngestConfig;
use common::feeds::DEFAULT_DEDUP_TTL_SECS;
use common::{env_opt, env_or};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub redis_url: String,
    pub http_port: u16,
    pub metrics_port: u16,
    pub redis_timeout: Duration,
    pub ingest: IngestConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: env_opt("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".into()),
            http_port: env_or("HTTP_PORT", 8090),
            metrics_port: env_or("METRICS_PORT", 9095),
            redis_timeout: Duration::from_millis(env_or("REDIS_TIMEOUT_MS", 2000)),
            ingest: IngestConfig {
                webhook_secret: env_opt("WEBHOOK_SECRET"),
                dedup_ttl_secs: env_or("DEDUP_TTL_SECS", DEFAULT_DEDUP_TTL_SECS),
            },
        }
    }
}
