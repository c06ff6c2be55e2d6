//! Integration tests for SQLite persistence
//!
//! Readings and advisory records written through the pipeline must survive
//! a restart and read back exactly as they were broadcast.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use greenhouse_hub::advisory::AdvisoryStatus;
use greenhouse_hub::history::HistoryService;
use greenhouse_hub::hub::BroadcastHub;
use greenhouse_hub::pipeline::Pipeline;
use greenhouse_hub::reading::{SensorPayload, ingestion_time};
use greenhouse_hub::storage::sqlite::SqliteBackend;
use greenhouse_hub::storage::{AdvisoryRecord, StorageBackend};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_readings_survive_restart() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("greenhouse.db");

    let broadcast = {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let pipeline = Pipeline::new(backend.clone(), Arc::new(BroadcastHub::default()));

        let payload: SensorPayload =
            serde_json::from_str(r#"{"t":23.5,"h":61,"device_id":"rak_01","fw":"1.2"}"#).unwrap();
        let delivery = pipeline.submit_manual(payload).await;
        assert!(delivery.persisted());

        backend.close().await.unwrap();
        delivery.reading
    };

    let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
    let history = HistoryService::new(backend).history(10).await;

    assert_eq!(history, vec![broadcast]);
}

#[tokio::test]
async fn test_datagram_readings_are_stored_with_origin_and_raw() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(
        SqliteBackend::new(temp_dir.path().join("ingest.db"))
            .await
            .unwrap(),
    );

    let (ingest, hub) = spawn_ingest(backend.clone(), Duration::from_millis(50));
    let mut events = hub.subscribe();

    send_datagram(ingest.local_addr(), br#"{"l":420}"#).await;
    let first = next_event(&mut events).await;
    send_datagram(ingest.local_addr(), b"temp=21").await;
    let second = next_event(&mut events).await;

    let stored = backend.recent_readings(10).await.unwrap();
    assert_eq!(stored.len(), 2);

    assert_eq!(serde_json::to_value(&stored[0]).unwrap(), second.data);
    assert_eq!(serde_json::to_value(&stored[1]).unwrap(), first.data);
    assert_eq!(stored[0].raw.as_deref(), Some("temp=21"));
    assert_eq!(stored[1].l, Some(420.0));
}

#[tokio::test]
async fn test_concurrent_inserts_get_distinct_ids() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(
        SqliteBackend::new(temp_dir.path().join("concurrent.db"))
            .await
            .unwrap(),
    );
    let pipeline = Pipeline::new(backend.clone(), Arc::new(BroadcastHub::default()));

    let mut tasks = Vec::new();
    for i in 0..20 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            let payload = SensorPayload {
                t: Some(f64::from(i)),
                ..Default::default()
            };
            pipeline.submit_manual(payload).await.reading.id.unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap());
    }
    assert_eq!(ids.len(), 20);
    assert_eq!(backend.recent_readings(100).await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_advisory_audit_trail_persists() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("audit.db");

    {
        let backend = SqliteBackend::new(&db_path).await.unwrap();
        let context = backend_reading();
        let record = AdvisoryRecord::new(
            &context,
            Some("Too humid?".to_string()),
            "A little; open the vents.".to_string(),
            AdvisoryStatus::Answered,
            ingestion_time(),
        );
        backend.insert_advisory(&record).await.unwrap();
        backend.close().await.unwrap();
    }

    let backend = SqliteBackend::new(&db_path).await.unwrap();
    let records = backend.recent_advisories(5).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].question.as_deref(), Some("Too humid?"));
    assert_eq!(records[0].status, AdvisoryStatus::Answered);
    assert_eq!(records[0].h, Some(85.0));
    assert!(records[0].id.is_some());
}

fn backend_reading() -> greenhouse_hub::reading::Reading {
    greenhouse_hub::reading::Reading::manual(SensorPayload {
        t: Some(24.0),
        h: Some(85.0),
        ..Default::default()
    })
}
