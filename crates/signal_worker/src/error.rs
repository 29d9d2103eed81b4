//! Error types for the worker stages.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    /// Queue entry could not be decoded; it is discarded.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Dependency(#[from] common::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    /// Label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed",
            Self::Dependency(_) => "dependency",
            Self::Json(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
