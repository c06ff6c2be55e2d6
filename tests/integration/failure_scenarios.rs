//! Failure tests for the ingestion loop
//!
//! A broken store, a panicking dependency, or a port that cannot be bound
//! must degrade one packet or one component, never the whole hub.

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use greenhouse_hub::actors::ingest::{IngestConfig, IngestError, IngestHandle};
use greenhouse_hub::history::HistoryService;
use greenhouse_hub::hub::BroadcastHub;
use greenhouse_hub::pipeline::Pipeline;
use greenhouse_hub::storage::StorageBackend;

use crate::helpers::*;

#[tokio::test]
async fn test_store_down_still_broadcasts_without_id() {
    let (ingest, hub) = spawn_ingest(Arc::new(FailingStore), Duration::from_millis(50));
    let mut events = hub.subscribe();

    send_datagram(ingest.local_addr(), br#"{"t":25.0}"#).await;

    let event = next_event(&mut events).await;
    assert!(event.data["id"].is_null(), "unsaved reading must have no id");
    assert_eq!(event.data["t"], 25.0);

    let stats = ingest.stats().await.unwrap();
    assert_eq!(stats.persist_failures, 1);
    assert_eq!(stats.iteration_errors, 0);

    // Loop keeps serving
    send_datagram(ingest.local_addr(), br#"{"t":26.0}"#).await;
    assert_eq!(next_event(&mut events).await.data["t"], 26.0);
}

#[tokio::test]
async fn test_history_degrades_to_empty_when_store_down() {
    let history = HistoryService::new(Arc::new(FailingStore));
    assert!(history.history(10).await.is_empty());
}

#[tokio::test]
async fn test_panic_is_contained_and_loop_recovers() {
    let store = Arc::new(PanickingStore::new(1));
    let (ingest, hub) = spawn_ingest(store.clone(), Duration::from_millis(100));
    let mut events = hub.subscribe();

    send_datagram(ingest.local_addr(), br#"{"t":1}"#).await;

    // The panicking packet is never broadcast
    let missed = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
    assert!(missed.is_err());

    send_datagram(ingest.local_addr(), br#"{"t":2}"#).await;
    let event = next_event(&mut events).await;
    assert_eq!(event.data["t"], 2.0);

    let stats = ingest.stats().await.unwrap();
    assert_eq!(stats.packets_received, 2);
    assert_eq!(stats.iteration_errors, 1);
    assert_eq!(stats.persisted, 1);

    assert_eq!(store.recent_readings(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_iteration_pauses_before_next_packet() {
    let backoff = Duration::from_millis(400);
    let (ingest, hub) = spawn_ingest(Arc::new(PanickingStore::new(1)), backoff);
    let mut events = hub.subscribe();

    let started = Instant::now();
    send_datagram(ingest.local_addr(), br#"{"t":1}"#).await;
    send_datagram(ingest.local_addr(), br#"{"t":2}"#).await;

    let event = next_event(&mut events).await;
    assert_eq!(event.data["t"], 2.0);
    let waited = started.elapsed();
    assert!(
        waited >= backoff - Duration::from_millis(50),
        "next packet handled after {waited:?}, before the {backoff:?} pause"
    );
}

#[tokio::test]
async fn test_successful_iterations_do_not_pause() {
    let backoff = Duration::from_millis(400);
    let (ingest, hub) = spawn_ingest(Arc::new(PanickingStore::new(0)), backoff);
    let mut events = hub.subscribe();

    let started = Instant::now();
    send_datagram(ingest.local_addr(), br#"{"t":1}"#).await;
    send_datagram(ingest.local_addr(), br#"{"t":2}"#).await;

    assert_eq!(next_event(&mut events).await.data["t"], 1.0);
    assert_eq!(next_event(&mut events).await.data["t"], 2.0);
    let waited = started.elapsed();
    assert!(
        waited < backoff / 2,
        "healthy packets took {waited:?}, the loop paused without a failure"
    );
}

#[tokio::test]
async fn test_bind_failure_is_reported_not_fatal() {
    // TEST-NET-1 is never assigned to a local interface
    let addr = "192.0.2.1:5005".parse().unwrap();
    let hub = BroadcastHub::default();
    let pipeline = Pipeline::new(Arc::new(FailingStore), Arc::new(hub.clone()));

    let result = IngestHandle::spawn(IngestConfig::new(addr), pipeline.clone());
    assert_matches!(result, Err(IngestError::Bind { .. }));

    // The rest of the pipeline is unaffected
    let mut events = hub.subscribe();
    let delivery = pipeline
        .submit_manual(serde_json::from_str(r#"{"t":19}"#).unwrap())
        .await;
    assert!(!delivery.persisted());
    assert_eq!(events.recv().await.unwrap().data["t"], 19.0);
}

#[tokio::test]
async fn test_port_reuse_allows_rebinding_after_shutdown() {
    let (ingest, _hub) = spawn_ingest(Arc::new(FailingStore), Duration::from_millis(50));
    let addr = ingest.local_addr();
    ingest.shutdown().await.unwrap();

    let hub = BroadcastHub::default();
    let pipeline = Pipeline::new(Arc::new(FailingStore), Arc::new(hub));
    let restarted = IngestHandle::spawn(IngestConfig::new(addr), pipeline).unwrap();
    assert_eq!(restarted.local_addr(), addr);
}
