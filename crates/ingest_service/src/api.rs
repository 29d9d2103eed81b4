//! HTTP API for the ingestion gateway.
//!
//! Endpoints:
//! - `POST /signals/tradingview` - Ingest a signal webhook
//! - `GET /monitoring/queues` - Queue and feed lengths
//! - `GET /monitoring/queue?limit=N` - Newest entries still on the main queue
//! - `GET /monitoring/recent?limit=N` - Recently enqueued / processed / delivered
//! - `GET /monitoring/triggered?email=E&limit=N` - Triggered-alarm feed
//! - `GET /health` - Health check

use crate::ingest::{IngestReceipt, Ingestor};
use crate::monitoring::{clamp_limit, Monitor, QueueDepths, RecentActivity};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{Signal, TriggeredAlarm};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub monitor: Monitor,
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/signals/tradingview", post(webhook_handler))
        .route("/monitoring/queues", get(queue_depths_handler))
        .route("/monitoring/queue", get(peek_queue_handler))
        .route("/monitoring/recent", get(recent_handler))
        .route("/monitoring/triggered", get(triggered_handler))
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct WebhookAccepted {
    ok: bool,
    #[serde(flatten)]
    receipt: IngestReceipt,
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

#[derive(Serialize)]
struct PeekResponse {
    entries: Vec<Signal>,
    count: usize,
}

#[derive(Serialize)]
struct TriggeredResponse {
    alarms: Vec<TriggeredAlarm>,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TriggeredQuery {
    email: Option<String>,
    limit: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(context: &str, e: common::Error) -> ApiError {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            ok: false,
            error: "internal_error".to_string(),
        }),
    )
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// POST /signals/tradingview
///
/// Takes the raw body so schema problems are reported field by field
/// instead of as a generic JSON rejection.
async fn webhook_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match state.ingestor.ingest(&body).await {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(WebhookAccepted { ok: true, receipt }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /monitoring/queues
async fn queue_depths_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueDepths>, ApiError> {
    state
        .monitor
        .queue_depths()
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to read queue depths", e))
}

/// GET /monitoring/queue
async fn peek_queue_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<PeekResponse>, ApiError> {
    let entries = state
        .monitor
        .peek_main(clamp_limit(query.limit))
        .await
        .map_err(|e| internal_error("Failed to peek main queue", e))?;
    let count = entries.len();
    Ok(Json(PeekResponse { entries, count }))
}

/// GET /monitoring/recent
async fn recent_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<RecentActivity>, ApiError> {
    state
        .monitor
        .recent(clamp_limit(query.limit))
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to read recent activity", e))
}

/// GET /monitoring/triggered
async fn triggered_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TriggeredQuery>,
) -> Result<Json<TriggeredResponse>, ApiError> {
    let alarms = state
        .monitor
        .triggered(query.email.as_deref(), clamp_limit(query.limit))
        .await
        .map_err(|e| internal_error("Failed to read triggered alarms", e))?;
    let count = alarms.len();
    Ok(Json(TriggeredResponse { alarms, count }))
}
