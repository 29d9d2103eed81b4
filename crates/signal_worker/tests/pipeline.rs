//! End-to-end runs of gateway, processor and dispatcher over one in-memory store.

use common::feeds::{DELIVERY_FEED, MAIN_QUEUE, PROCESSED_QUEUE, TRIGGERED_FEED};
use common::{
    DeliveryRecord, DeliveryStatus, DurableQueue, InMemoryStore, RecordingChannel, SignalAction,
    StaticDirectory, Subscription, TriggeredAlarm,
};
use ingest_service::{IngestConfig, Ingestor, Monitor};
use serde_json::json;
use signal_worker::{
    NotificationDispatcher, PollConfig, PollOutcome, PollingWorker, SignalProcessor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const SECRET: &str = "pipeline-secret";

struct Pipeline {
    store: Arc<InMemoryStore>,
    channel: Arc<RecordingChannel>,
    ingestor: Ingestor,
    processor: PollingWorker<SignalProcessor>,
    dispatcher: PollingWorker<NotificationDispatcher>,
    _shutdown: Vec<mpsc::Sender<()>>,
}

impl Pipeline {
    fn new(subscriptions: Vec<Subscription>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let directory = Arc::new(StaticDirectory::new(subscriptions));
        let channel = Arc::new(RecordingChannel::new());

        let ingestor = Ingestor::new(
            store.clone(),
            store.clone(),
            IngestConfig {
                webhook_secret: Some(SECRET.to_string()),
                dedup_ttl_secs: 300,
            },
        );

        let (processor_tx, processor_rx) = mpsc::channel(1);
        let (dispatcher_tx, dispatcher_rx) = mpsc::channel(1);
        let processor = PollingWorker::new(
            SignalProcessor::new(store.clone(), directory.clone(), true),
            store.clone(),
            PollConfig::default(),
            processor_rx,
        );
        let dispatcher = PollingWorker::new(
            NotificationDispatcher::new(store.clone(), directory, channel.clone(), true),
            store.clone(),
            PollConfig::default(),
            dispatcher_rx,
        );

        Self {
            store,
            channel,
            ingestor,
            processor,
            dispatcher,
            _shutdown: vec![processor_tx, dispatcher_tx],
        }
    }

    async fn post(&self, symbol: &str, action: &str, timestamp: &str) {
        let body = json!({
            "symbol": symbol,
            "timeframe": "15m",
            "action": action,
            "price": 2250.5,
            "timestamp": timestamp,
            "secret": SECRET,
        });
        self.ingestor
            .ingest(body.to_string().as_bytes())
            .await
            .expect("webhook accepted");
    }

    /// Run both stages until their queues are empty.
    async fn drain(&self) {
        while self.processor.poll_once().await != PollOutcome::Idle {}
        while self.dispatcher.poll_once().await != PollOutcome::Idle {}
    }

    fn triggered(&self) -> Vec<TriggeredAlarm> {
        decode(&self.store.entries(TRIGGERED_FEED))
    }

    fn deliveries(&self) -> Vec<DeliveryRecord> {
        decode(&self.store.entries(DELIVERY_FEED))
    }
}

fn decode<T: serde::de::DeserializeOwned>(entries: &[String]) -> Vec<T> {
    entries.iter().map(|e| serde_json::from_str(e).unwrap()).collect()
}

fn sub(email: &str, symbol: &str, action: SignalAction) -> Subscription {
    Subscription {
        email: email.to_string(),
        coin_symbol: symbol.to_string(),
        action: Some(action),
        is_active: true,
    }
}

#[tokio::test]
async fn test_matching_subscriber_gets_one_alarm_and_one_delivery() {
    let pipeline = Pipeline::new(vec![sub("a@b.com", "ETHUSDT", SignalAction::Sell)]);

    pipeline
        .post("BINANCE:ETHUSDT", "sell", "2024-01-01T00:00:00Z")
        .await;
    pipeline.drain().await;

    let triggered = pipeline.triggered();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].email, "a@b.com");
    assert_eq!(triggered[0].symbol, "ETHUSDT");
    assert_eq!(triggered[0].id, "a@b.com|ETHUSDT|2024-01-01T00:00:00.000Z");

    let deliveries = pipeline.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].recipient_id, "a@b.com");
    assert_eq!(deliveries[0].status, DeliveryStatus::Sent);
    assert_eq!(pipeline.channel.sent_to("a@b.com"), vec!["ETHUSDT"]);

    assert_eq!(pipeline.store.depth(MAIN_QUEUE).await.unwrap(), 0);
    assert_eq!(pipeline.store.depth(PROCESSED_QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_opposite_action_subscriber_gets_nothing() {
    let pipeline = Pipeline::new(vec![sub("a@b.com", "ETHUSDT", SignalAction::Buy)]);

    pipeline.post("ETHUSDT", "sell", "2024-01-01T00:00:00Z").await;
    pipeline.drain().await;

    assert!(pipeline.triggered().is_empty());
    assert!(pipeline.deliveries().is_empty());
    assert!(pipeline.channel.sent_to("a@b.com").is_empty());
}

#[tokio::test]
async fn test_malformed_entries_do_not_block_queues() {
    let pipeline = Pipeline::new(vec![sub("a@b.com", "ETHUSDT", SignalAction::Sell)]);

    pipeline.store.enqueue(MAIN_QUEUE, "{not json").await.unwrap();
    pipeline.post("ETHUSDT", "sell", "2024-01-01T00:00:00Z").await;

    assert_eq!(pipeline.processor.poll_once().await, PollOutcome::Discarded);
    assert_eq!(pipeline.processor.poll_once().await, PollOutcome::Processed);

    // A processed entry missing its signal fields is dropped the same way.
    pipeline
        .store
        .enqueue(PROCESSED_QUEUE, r#"{"processedAt":"2024-01-01T00:00:01.000Z"}"#)
        .await
        .unwrap();
    pipeline.drain().await;

    assert_eq!(pipeline.triggered().len(), 1);
    assert_eq!(pipeline.deliveries().len(), 1);
}

#[tokio::test]
async fn test_signals_are_processed_in_arrival_order() {
    let pipeline = Pipeline::new(vec![sub("a@b.com", "ETHUSDT", SignalAction::Sell)]);

    for ts in ["2024-01-01T00:00:00Z", "2024-01-01T00:15:00Z", "2024-01-01T00:30:00Z"] {
        pipeline.post("ETHUSDT", "sell", ts).await;
    }
    pipeline.drain().await;

    // Feeds are newest first.
    let order: Vec<String> = pipeline
        .triggered()
        .into_iter()
        .rev()
        .map(|a| a.signal_timestamp)
        .collect();
    assert_eq!(
        order,
        vec![
            "2024-01-01T00:00:00.000Z",
            "2024-01-01T00:15:00.000Z",
            "2024-01-01T00:30:00.000Z",
        ]
    );
}

#[tokio::test]
async fn test_monitor_sees_worker_output() {
    let pipeline = Pipeline::new(vec![
        sub("a@b.com", "ETHUSDT", SignalAction::Sell),
        sub("c@d.com", "ETHUSDT", SignalAction::Sell),
    ]);
    pipeline.channel.fail_for("c@d.com");

    pipeline.post("ETHUSDT", "sell", "2024-01-01T00:00:00Z").await;
    pipeline.drain().await;

    let monitor = Monitor::new(pipeline.store.clone());
    let recent = monitor.recent(10).await.unwrap();
    assert_eq!(recent.enqueued.len(), 1);
    assert_eq!(recent.processed.len(), 1);
    assert_eq!(recent.processed[0].deliveries.len(), 2);
    assert_eq!(recent.delivered.len(), 2);
    assert_eq!(
        recent
            .delivered
            .iter()
            .filter(|d| d.status == DeliveryStatus::Failed)
            .count(),
        1
    );

    let mine = monitor.triggered(Some("a@b.com"), 10).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_running_workers_deliver_and_stop() {
    let store = Arc::new(InMemoryStore::new());
    let directory = Arc::new(StaticDirectory::new(vec![sub(
        "a@b.com",
        "BTCUSDT",
        SignalAction::Buy,
    )]));
    let channel = Arc::new(RecordingChannel::new());
    let ingestor = Ingestor::new(
        store.clone(),
        store.clone(),
        IngestConfig {
            webhook_secret: Some(SECRET.to_string()),
            dedup_ttl_secs: 300,
        },
    );

    let (processor_tx, processor_rx) = mpsc::channel(1);
    let (dispatcher_tx, dispatcher_rx) = mpsc::channel(1);
    let processor = tokio::spawn(
        PollingWorker::new(
            SignalProcessor::new(store.clone(), directory.clone(), true),
            store.clone(),
            PollConfig::default(),
            processor_rx,
        )
        .run(),
    );
    let dispatcher = tokio::spawn(
        PollingWorker::new(
            NotificationDispatcher::new(store.clone(), directory, channel.clone(), true),
            store.clone(),
            PollConfig::default(),
            dispatcher_rx,
        )
        .run(),
    );

    let body = json!({
        "symbol": "BTC/USDT",
        "timeframe": "1h",
        "action": "BUY",
        "timestamp": 1704067200000u64,
        "secret": SECRET,
    });
    ingestor.ingest(body.to_string().as_bytes()).await.unwrap();

    // Both loops pick the entry up within a couple of idle intervals.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(channel.sent_to("a@b.com"), vec!["BTCUSDT"]);

    processor_tx.send(()).await.unwrap();
    dispatcher_tx.send(()).await.unwrap();
    processor.await.unwrap();
    dispatcher.await.unwrap();
}
