//! Error types for the ingestion gateway.
//!
//! Every variant maps to a stable, machine-checkable `error` code in the
//! HTTP response body.

use crate::validation::FieldIssue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Malformed or missing fields.
    #[error("Validation failed with {} issue(s)", .0.len())]
    Validation(Vec<FieldIssue>),

    /// Shared secret missing on the server or not matching.
    #[error("Invalid secret")]
    InvalidSecret,

    /// Same idempotency key seen within the dedup window.
    #[error("Duplicate signal: {0}")]
    Duplicate(String),

    /// Queue unavailable.
    #[error("Dependency error: {0}")]
    Dependency(#[from] common::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::Validation(_) => StatusCode::BAD_REQUEST,
            IngestError::InvalidSecret => StatusCode::UNAUTHORIZED,
            IngestError::Duplicate(_) => StatusCode::CONFLICT,
            IngestError::Dependency(_) | IngestError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "validation_error",
            IngestError::InvalidSecret => "invalid_secret",
            IngestError::Duplicate(_) => "duplicate_signal",
            IngestError::Dependency(_) | IngestError::Json(_) => "internal_error",
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = match self {
            IngestError::Validation(details) => json!({
                "ok": false,
                "error": code,
                "message": "Invalid webhook payload",
                "details": details,
            }),
            IngestError::Duplicate(key) => json!({
                "ok": false,
                "error": code,
                "message": "Signal already received within the dedup window",
                "idempotencyKey": key,
            }),
            IngestError::InvalidSecret
            | IngestError::Dependency(_)
            | IngestError::Json(_) => json!({ "ok": false, "error": code }),
        };
        (status, Json(body)).into_response()
    }
}
