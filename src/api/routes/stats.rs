//! Ingestion statistics endpoint

use axum::{Json, extract::State};
use tracing::debug;

use crate::api::{state::ApiState, types::StatsResponse};

/// GET /stats
///
/// Returns the ingestion counters, or `null` when the listener is not running
pub async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    let (ingest, listen_addr) = match &state.ingest {
        Some(handle) => {
            let stats = handle
                .stats()
                .await
                .inspect_err(|e| debug!("ingestion loop not answering: {e:#}"))
                .ok();
            (stats, Some(handle.local_addr().to_string()))
        }
        None => (None, None),
    };

    Json(StatsResponse {
        ingest,
        listen_addr,
        subscribers: state.hub.subscriber_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
