//! End-to-end tests of the datagram path: socket → decode → persist → broadcast

use std::sync::Arc;
use std::time::Duration;

use greenhouse_hub::actors::ingest::{IngestConfig, IngestHandle, RECV_BUFFER_SIZE};
use greenhouse_hub::hub::SENSOR_EVENT;
use greenhouse_hub::pipeline::Pipeline;
use greenhouse_hub::storage::{MemoryBackend, StorageBackend};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_structured_datagram_is_stored_then_broadcast() {
    let store = Arc::new(MemoryBackend::new());
    let (ingest, hub) = spawn_ingest(store.clone(), Duration::from_millis(50));
    let mut events = hub.subscribe();

    send_datagram(ingest.local_addr(), br#"{"t":25.0,"h":60.0,"l":300}"#).await;

    let event = next_event(&mut events).await;
    assert_eq!(event.event, SENSOR_EVENT);
    assert_eq!(event.data["t"], 25.0);
    assert_eq!(event.data["h"], 60.0);
    assert_eq!(event.data["l"], 300.0);

    let stored = store.recent_readings(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(event.data["id"], stored[0].id.clone().unwrap());
    assert_eq!(
        event.data["timestamp"],
        serde_json::to_value(stored[0].timestamp).unwrap()
    );

    ingest.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_non_json_datagram_keeps_raw_text() {
    let store = Arc::new(MemoryBackend::new());
    let (ingest, hub) = spawn_ingest(store.clone(), Duration::from_millis(50));
    let mut events = hub.subscribe();

    send_datagram(ingest.local_addr(), b"not json").await;

    let event = next_event(&mut events).await;
    assert_eq!(event.data["raw"], "not json");
    assert!(event.data["id"].is_string());
    assert!(event.data.get("t").is_none());

    let stored = store.latest_reading().await.unwrap().unwrap();
    assert_eq!(stored.raw.as_deref(), Some("not json"));
}

#[tokio::test]
async fn test_sender_reserved_keys_are_overwritten() {
    let store = Arc::new(MemoryBackend::new());
    let (ingest, hub) = spawn_ingest(store, Duration::from_millis(50));
    let mut events = hub.subscribe();

    send_datagram(
        ingest.local_addr(),
        br#"{"t":21.5,"timestamp":"1999-01-01T00:00:00Z","origin":"spoofed","id":"x","device_id":"rak_01","fw":"1.2"}"#,
    )
    .await;

    let event = next_event(&mut events).await;
    assert_ne!(event.data["timestamp"], "1999-01-01T00:00:00Z");
    assert_ne!(event.data["origin"], "spoofed");
    assert_ne!(event.data["id"], "x");
    assert_eq!(event.data["device_id"], "rak_01");
    assert_eq!(event.data["fw"], "1.2");
}

#[tokio::test]
async fn test_persist_happens_before_broadcast() {
    let log = call_log();
    let store = Arc::new(RecordingStore::new(log.clone()));
    let hub = Arc::new(RecordingHub::new(log.clone()));
    let mut events = hub.subscribe();

    let pipeline = Pipeline::new(store, hub.clone());
    let ingest = IngestHandle::spawn(IngestConfig::new(local_addr()), pipeline).unwrap();

    for _ in 0..3 {
        send_datagram(ingest.local_addr(), br#"{"t":20}"#).await;
        next_event(&mut events).await;
    }

    let calls = log.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            "persist",
            "broadcast:sensor_reading",
            "persist",
            "broadcast:sensor_reading",
            "persist",
            "broadcast:sensor_reading",
        ]
    );
}

#[tokio::test]
async fn test_stats_count_every_packet() {
    let store = Arc::new(MemoryBackend::new());
    let (ingest, hub) = spawn_ingest(store, Duration::from_millis(50));
    let mut events = hub.subscribe();

    send_datagram(ingest.local_addr(), br#"{"t":20}"#).await;
    next_event(&mut events).await;
    send_datagram(ingest.local_addr(), b"\xff\xfegarbage").await;
    next_event(&mut events).await;

    let stats = ingest.stats().await.unwrap();
    assert_eq!(stats.packets_received, 2);
    assert_eq!(stats.structured, 1);
    assert_eq!(stats.unstructured, 1);
    assert_eq!(stats.persisted, 2);
    assert_eq!(stats.iteration_errors, 0);
    assert!(stats.last_packet_at.is_some());
}

#[tokio::test]
async fn test_oversized_datagram_is_truncated_and_kept() {
    let store = Arc::new(MemoryBackend::new());
    let (ingest, hub) = spawn_ingest(store.clone(), Duration::from_millis(50));
    let mut events = hub.subscribe();

    let mut payload = String::from(r#"{"pad":""#);
    payload.push_str(&"x".repeat(2000));
    payload.push_str(r#""}"#);
    send_datagram(ingest.local_addr(), payload.as_bytes()).await;

    let event = next_event(&mut events).await;
    let raw = event.data["raw"].as_str().unwrap();
    assert_eq!(raw.len(), RECV_BUFFER_SIZE);
    assert_eq!(raw, &payload[..RECV_BUFFER_SIZE]);
    assert!(event.data["id"].is_string());

    let stats = ingest.stats().await.unwrap();
    assert_eq!(stats.unstructured, 1);
    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.iteration_errors, 0);
}
