//! Manual report intake

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;
use tracing::{info, instrument};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::ManualReportResponse,
};
use crate::reading::SensorPayload;

/// POST /manual-report
///
/// Stamps the body as a manual reading, persists it and broadcasts it.
/// Responds 201 with the stored reading, or 503 when persistence failed
/// (the reading has been broadcast live-only in that case).
#[instrument(skip_all)]
pub async fn submit_report(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ManualReportResponse>)> {
    let Json(body) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    let payload = SensorPayload::from_json(body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid report: {e}")))?;

    let delivery = state.pipeline.submit_manual(payload).await;

    if let Some(err) = delivery.persist_error {
        return Err(ApiError::StorageUnavailable(format!(
            "report was broadcast but could not be saved: {err}"
        )));
    }

    info!("manual report stored");

    Ok((
        StatusCode::CREATED,
        Json(ManualReportResponse {
            id: delivery.reading.id.clone(),
            reading: delivery.reading,
        }),
    ))
}
