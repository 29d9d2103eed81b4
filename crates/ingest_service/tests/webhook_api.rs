//! HTTP-level tests for the webhook and monitoring endpoints.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::feeds::{ENQUEUED_MIRROR, MAIN_QUEUE};
use common::InMemoryStore;
use ingest_service::{create_router, AppState, IngestConfig, Ingestor, Monitor};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "webhook-secret";

fn app_with(queue: Arc<InMemoryStore>, guard: Arc<InMemoryStore>, secret: Option<&str>) -> Router {
    let config = IngestConfig {
        webhook_secret: secret.map(str::to_string),
        dedup_ttl_secs: 300,
    };
    create_router(AppState {
        ingestor: Ingestor::new(queue.clone(), guard, config),
        monitor: Monitor::new(queue),
    })
}

fn app(store: Arc<InMemoryStore>) -> Router {
    app_with(store.clone(), store, Some(SECRET))
}

fn webhook(symbol: &str, secret: &str) -> Value {
    json!({
        "symbol": symbol,
        "timeframe": "15m",
        "action": "sell",
        "price": 2250.5,
        "timestamp": "2024-01-01T00:00:00Z",
        "secret": secret,
    })
}

async fn post(app: &Router, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/signals/tradingview")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_accepts_valid_webhook() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store.clone());

    let (status, body) = post(&app, &webhook("BINANCE:ETHUSDT", SECRET)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);
    assert_eq!(body["normalizedSymbol"], "ETHUSDT");
    assert_eq!(body["timeframe"], "15m");
    assert_eq!(body["action"], "sell");
    assert_eq!(body["timestamp"], "2024-01-01T00:00:00.000Z");
    assert_eq!(
        body["idempotencyKey"],
        "ETHUSDT:15m:2024-01-01T00:00:00.000Z:sell"
    );
    assert_eq!(store.entries(MAIN_QUEUE).len(), 1);
    assert_eq!(store.entries(ENQUEUED_MIRROR).len(), 1);
}

#[tokio::test]
async fn test_duplicate_within_window() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store.clone());
    let body = webhook("ETHUSDT", SECRET);

    let (first, _) = post(&app, &body).await;
    let (second, dup) = post(&app, &body).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(dup["ok"], false);
    assert_eq!(dup["error"], "duplicate_signal");
    assert_eq!(dup["idempotencyKey"], "ETHUSDT:15m:2024-01-01T00:00:00.000Z:sell");
    assert_eq!(store.entries(MAIN_QUEUE).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_accepted_again_after_window() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store.clone());
    let body = webhook("ETHUSDT", SECRET);

    assert_eq!(post(&app, &body).await.0, StatusCode::CREATED);
    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(post(&app, &body).await.0, StatusCode::CREATED);
    assert_eq!(store.entries(MAIN_QUEUE).len(), 2);
}

#[tokio::test]
async fn test_symbol_variants_share_key() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store.clone());

    let (status, accepted) = post(&app, &webhook("BINANCE:ETHUSDT", SECRET)).await;
    assert_eq!(status, StatusCode::CREATED);

    for variant in ["ETH/USDT", "ETHUSDT"] {
        let (status, body) = post(&app, &webhook(variant, SECRET)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["idempotencyKey"], accepted["idempotencyKey"]);
    }
}

#[tokio::test]
async fn test_invalid_secret_beats_duplicate() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store.clone());

    assert_eq!(post(&app, &webhook("ETHUSDT", SECRET)).await.0, StatusCode::CREATED);

    let (status, body) = post(&app, &webhook("ETHUSDT", "wrong-secret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"ok": false, "error": "invalid_secret"}));
}

#[tokio::test]
async fn test_unconfigured_secret_rejects_everything() {
    let store = Arc::new(InMemoryStore::new());
    let app = app_with(store.clone(), store.clone(), None);

    let (status, _) = post(&app, &webhook("ETHUSDT", SECRET)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(store.entries(MAIN_QUEUE).is_empty());
}

#[tokio::test]
async fn test_validation_runs_before_auth() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store);

    let mut body = webhook("ETHUSDT", "wrong-secret");
    body["timeframe"] = json!("3m");

    let (status, response) = post(&app, &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "validation_error");
    assert_eq!(response["details"][0]["field"], "timeframe");
}

#[tokio::test]
async fn test_non_json_body() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store);

    let request = Request::builder()
        .method("POST")
        .uri("/signals/tradingview")
        .body(Body::from("BTCUSDT buy"))
        .unwrap();
    let (status, response) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["details"][0]["field"], "body");
}

#[tokio::test]
async fn test_mirror_failure_does_not_fail_request() {
    let store = Arc::new(InMemoryStore::new());
    store.fail_writes_to(ENQUEUED_MIRROR);
    let app = app(store.clone());

    let (status, _) = post(&app, &webhook("ETHUSDT", SECRET)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(store.entries(MAIN_QUEUE).len(), 1);
}

#[tokio::test]
async fn test_queue_outage_is_internal_error() {
    let queue = Arc::new(InMemoryStore::new());
    let guard = Arc::new(InMemoryStore::new());
    queue.fail_writes_to(MAIN_QUEUE);
    let app = app_with(queue, guard, Some(SECRET));

    let (status, body) = post(&app, &webhook("ETHUSDT", SECRET)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"ok": false, "error": "internal_error"}));
}

#[tokio::test]
async fn test_guard_outage_fails_open() {
    let queue = Arc::new(InMemoryStore::new());
    let guard = Arc::new(InMemoryStore::new());
    guard.set_unavailable(true);
    let app = app_with(queue.clone(), guard, Some(SECRET));

    assert_eq!(post(&app, &webhook("ETHUSDT", SECRET)).await.0, StatusCode::CREATED);
    assert_eq!(queue.entries(MAIN_QUEUE).len(), 1);
}

#[tokio::test]
async fn test_monitoring_endpoints() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(store);

    for ts in ["2024-01-01T00:00:00Z", "2024-01-01T00:15:00Z", "2024-01-01T00:30:00Z"] {
        let mut body = webhook("ETHUSDT", SECRET);
        body["timestamp"] = json!(ts);
        assert_eq!(post(&app, &body).await.0, StatusCode::CREATED);
    }

    let (status, depths) = get(&app, "/monitoring/queues").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(depths["main"], 3);
    assert_eq!(depths["enqueuedMirror"], 3);
    assert_eq!(depths["processed"], 0);

    let (_, peek) = get(&app, "/monitoring/queue?limit=2").await;
    assert_eq!(peek["count"], 2);
    assert_eq!(peek["entries"][0]["timestamp"], "2024-01-01T00:30:00.000Z");

    let (_, recent) = get(&app, "/monitoring/recent").await;
    assert_eq!(recent["enqueued"].as_array().map(Vec::len), Some(3));
    assert_eq!(recent["delivered"].as_array().map(Vec::len), Some(0));

    let (_, triggered) = get(&app, "/monitoring/triggered?email=a@b.com").await;
    assert_eq!(triggered["count"], 0);

    let (status, health) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
}
