//! Health check endpoint

use axum::{Json, extract::State};
use tracing::warn;

use crate::api::{state::ApiState, types::HealthResponse};
use crate::storage::HealthStatus;

/// GET /health
///
/// Always 200; `status` is "degraded" when the store reports a problem.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let storage = match state.store().health_check().await {
        Ok(health) => health,
        Err(e) => {
            warn!("storage health check failed: {e}");
            HealthStatus {
                healthy: false,
                message: e.to_string(),
                metadata: Default::default(),
            }
        }
    };

    let status = if storage.healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        storage,
        subscribers: state.hub.subscriber_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
