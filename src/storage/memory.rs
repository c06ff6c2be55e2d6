//! In-memory storage backend (no persistence)
//!
//! This backend keeps readings and advisory records in bounded ring buffers.
//! It's useful for:
//! - Testing without database dependencies
//! - Running the hub with `DATABASE_URL=memory`
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Limited capacity**: oldest records are evicted once a buffer is full
//! - **Closing is final**: after `close()` every call fails with
//!   `StorageError::Unavailable`

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::AdvisoryRecord;
use crate::reading::Reading;

/// Maximum readings kept in memory
const MAX_READINGS: usize = 1000;

/// Maximum advisory records kept in memory
const MAX_ADVISORIES: usize = 200;

#[derive(Default)]
struct MemoryState {
    readings: VecDeque<Reading>,
    advisories: VecDeque<AdvisoryRecord>,
    next_id: u64,
    closed: bool,
}

impl MemoryState {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Unavailable("memory backend closed".to_string()));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// In-memory storage backend
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_reading(&self, reading: &Reading) -> StorageResult<String> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let id = state.allocate_id();
        let mut stored = reading.clone();
        stored.id = Some(id.clone());

        if state.readings.len() == MAX_READINGS {
            state.readings.pop_front();
        }
        state.readings.push_back(stored);

        debug!("stored reading {id} in memory");
        Ok(id)
    }

    async fn recent_readings(&self, limit: usize) -> StorageResult<Vec<Reading>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state.readings.iter().rev().take(limit).cloned().collect())
    }

    async fn insert_advisory(&self, record: &AdvisoryRecord) -> StorageResult<String> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let id = state.allocate_id();
        let mut stored = record.clone();
        stored.id = Some(id.clone());

        if state.advisories.len() == MAX_ADVISORIES {
            state.advisories.pop_front();
        }
        state.advisories.push_back(stored);

        Ok(id)
    }

    async fn recent_advisories(&self, limit: usize) -> StorageResult<Vec<AdvisoryRecord>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state.advisories.iter().rev().take(limit).cloned().collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;

        Ok(HealthStatus {
            healthy: !state.closed,
            message: if state.closed {
                "In-memory storage closed".to_string()
            } else {
                "In-memory storage operational".to_string()
            },
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("readings".to_string(), state.readings.len().to_string()),
                ("advisories".to_string(), state.advisories.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend");
        self.state.write().await.closed = true;
        Ok(())
    }
}
