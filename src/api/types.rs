//! Request and response bodies

use serde::{Deserialize, Serialize};

use crate::actors::messages::IngestStats;
use crate::reading::Reading;
use crate::storage::HealthStatus;

/// Query parameters accepted by the list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Body of a successful manual report
#[derive(Debug, Serialize)]
pub struct ManualReportResponse {
    pub id: Option<String>,
    pub reading: Reading,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub storage: HealthStatus,
    pub subscribers: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Ingestion counters, null when the listener is not running
    pub ingest: Option<IngestStats>,
    pub listen_addr: Option<String>,
    pub subscribers: usize,
    pub timestamp: String,
}
