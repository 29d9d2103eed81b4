//! Error types shared by the pipeline crates.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Queue, idempotency store or configuration store unavailable.
    #[error("Dependency unavailable: {0}")]
    Dependency(String),

    /// Notification channel refused or failed a send.
    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
