//! Helper types for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use greenhouse_hub::actors::ingest::{IngestConfig, IngestHandle};
use greenhouse_hub::hub::{BroadcastHub, Broadcaster, HubEvent};
use greenhouse_hub::pipeline::Pipeline;
use greenhouse_hub::reading::Reading;
use greenhouse_hub::storage::{
    AdvisoryRecord, HealthStatus, MemoryBackend, StorageBackend, StorageError, StorageResult,
};
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

/// Ordered record of persist and broadcast calls across components
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn local_addr() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Memory store that logs every insert attempt
pub struct RecordingStore {
    inner: MemoryBackend,
    log: CallLog,
}

impl RecordingStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: MemoryBackend::new(),
            log,
        }
    }
}

#[async_trait]
impl StorageBackend for RecordingStore {
    async fn insert_reading(&self, reading: &Reading) -> StorageResult<String> {
        self.log.lock().unwrap().push("persist".to_string());
        self.inner.insert_reading(reading).await
    }

    async fn recent_readings(&self, limit: usize) -> StorageResult<Vec<Reading>> {
        self.inner.recent_readings(limit).await
    }

    async fn insert_advisory(&self, record: &AdvisoryRecord) -> StorageResult<String> {
        self.inner.insert_advisory(record).await
    }

    async fn recent_advisories(&self, limit: usize) -> StorageResult<Vec<AdvisoryRecord>> {
        self.inner.recent_advisories(limit).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Store whose database is permanently unreachable
#[derive(Default)]
pub struct FailingStore;

fn offline() -> StorageError {
    StorageError::Unavailable("database offline".to_string())
}

#[async_trait]
impl StorageBackend for FailingStore {
    async fn insert_reading(&self, _reading: &Reading) -> StorageResult<String> {
        Err(offline())
    }

    async fn recent_readings(&self, _limit: usize) -> StorageResult<Vec<Reading>> {
        Err(offline())
    }

    async fn insert_advisory(&self, _record: &AdvisoryRecord) -> StorageResult<String> {
        Err(offline())
    }

    async fn recent_advisories(&self, _limit: usize) -> StorageResult<Vec<AdvisoryRecord>> {
        Err(offline())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: false,
            message: "database offline".to_string(),
            metadata: Default::default(),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Store that panics on the first `panics` inserts, then behaves
pub struct PanickingStore {
    inner: MemoryBackend,
    remaining: AtomicUsize,
}

impl PanickingStore {
    pub fn new(panics: usize) -> Self {
        Self {
            inner: MemoryBackend::new(),
            remaining: AtomicUsize::new(panics),
        }
    }
}

#[async_trait]
impl StorageBackend for PanickingStore {
    async fn insert_reading(&self, reading: &Reading) -> StorageResult<String> {
        let left = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if left.is_ok() {
            panic!("simulated storage driver panic");
        }
        self.inner.insert_reading(reading).await
    }

    async fn recent_readings(&self, limit: usize) -> StorageResult<Vec<Reading>> {
        self.inner.recent_readings(limit).await
    }

    async fn insert_advisory(&self, record: &AdvisoryRecord) -> StorageResult<String> {
        self.inner.insert_advisory(record).await
    }

    async fn recent_advisories(&self, limit: usize) -> StorageResult<Vec<AdvisoryRecord>> {
        self.inner.recent_advisories(limit).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Hub that logs every publish before forwarding it to a real hub
pub struct RecordingHub {
    inner: BroadcastHub,
    log: CallLog,
}

impl RecordingHub {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: BroadcastHub::default(),
            log,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.inner.subscribe()
    }
}

impl Broadcaster for RecordingHub {
    fn publish(&self, event: &str, payload: Value) {
        self.log.lock().unwrap().push(format!("broadcast:{event}"));
        self.inner.publish(event, payload);
    }
}

/// Ingestion loop wired to `store` and a fresh hub on an ephemeral port
pub fn spawn_ingest(
    store: Arc<dyn StorageBackend>,
    backoff: Duration,
) -> (IngestHandle, BroadcastHub) {
    let hub = BroadcastHub::default();
    let pipeline = Pipeline::new(store, Arc::new(hub.clone()));
    let config = IngestConfig::new(local_addr()).with_backoff(backoff);
    let handle = IngestHandle::spawn(config, pipeline).unwrap();
    (handle, hub)
}

pub async fn send_datagram(target: SocketAddr, payload: &[u8]) {
    let socket = UdpSocket::bind(local_addr()).await.unwrap();
    socket.send_to(payload, target).await.unwrap();
}

/// Next hub event, failing the test after two seconds
pub async fn next_event(rx: &mut broadcast::Receiver<HubEvent>) -> HubEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for hub event")
        .expect("hub closed")
}
