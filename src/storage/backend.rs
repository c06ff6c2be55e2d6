//! Storage backend trait definition
//!
//! This module defines the `StorageBackend` trait, the persistence gateway
//! every component writes through. Readings and advisory audit records share
//! one backend.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use super::error::StorageResult;
use super::schema::AdvisoryRecord;
use crate::reading::Reading;

/// Health status of the storage backend
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: the ingestion loop and every HTTP
/// handler hold the same `Arc<dyn StorageBackend>` and call it concurrently.
/// No operation spans more than one call, so implementations need no
/// cross-call locking.
///
/// ## Error Handling
///
/// Failures are reported as `StorageError` and never retried here. Retry and
/// degradation policy belongs to the caller.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a reading and return its assigned identifier
    ///
    /// Any `id` already on the reading is ignored.
    async fn insert_reading(&self, reading: &Reading) -> StorageResult<String>;

    /// The `limit` most recent readings, newest first
    async fn recent_readings(&self, limit: usize) -> StorageResult<Vec<Reading>>;

    /// The most recent reading, if any
    async fn latest_reading(&self) -> StorageResult<Option<Reading>> {
        Ok(self.recent_readings(1).await?.into_iter().next())
    }

    /// Store one advisory audit record and return its identifier
    async fn insert_advisory(&self, record: &AdvisoryRecord) -> StorageResult<String>;

    /// The `limit` most recent advisory records, newest first
    async fn recent_advisories(&self, limit: usize) -> StorageResult<Vec<AdvisoryRecord>>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
