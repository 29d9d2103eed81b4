//! Environment configuration for the worker binary.

use crate::poller::PollConfig;
use common::{env_flag, env_opt, env_or};
use external_services::DEFAULT_SUBSCRIPTIONS_TABLE;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub redis_timeout: Duration,
    pub metrics_port: u16,
    pub poll: PollConfig,
    /// Require the subscription's action (when set) to equal the signal's.
    pub match_action: bool,
    pub subscriptions_url: Option<String>,
    pub subscriptions_api_key: Option<String>,
    pub subscriptions_table: String,
    /// Email relay endpoint; notifications are only logged when unset.
    pub notify_url: Option<String>,
    pub notify_api_key: Option<String>,
    pub notify_from: String,
    pub http_timeout: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: env_opt("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".into()),
            redis_timeout: Duration::from_millis(env_or("REDIS_TIMEOUT_MS", 2000)),
            metrics_port: env_or("METRICS_PORT", 9096),
            poll: PollConfig {
                idle_delay: Duration::from_millis(env_or("POLL_INTERVAL_MS", 500)),
                error_delay: Duration::from_millis(env_or("ERROR_BACKOFF_MS", 1500)),
            },
            match_action: env_flag("MATCH_ACTION", true),
            subscriptions_url: env_opt("SUBSCRIPTIONS_URL"),
            subscriptions_api_key: env_opt("SUBSCRIPTIONS_API_KEY"),
            subscriptions_table: env_opt("SUBSCRIPTIONS_TABLE")
                .unwrap_or_else(|| DEFAULT_SUBSCRIPTIONS_TABLE.into()),
            notify_url: env_opt("NOTIFY_URL"),
            notify_api_key: env_opt("NOTIFY_API_KEY"),
            notify_from: env_opt("NOTIFY_FROM").unwrap_or_else(|| "alerts@localhost".into()),
            http_timeout: Duration::from_millis(env_or("HTTP_TIMEOUT_MS", 5000)),
        }
    }
}
