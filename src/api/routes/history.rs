//! Reading history endpoint

use axum::{
    Json,
    extract::{Query, State},
};

use crate::api::{state::ApiState, types::LimitQuery};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::reading::Reading;

/// GET /history?limit=N
///
/// Most recent readings first. Never fails: a store problem yields `[]`.
pub async fn get_history(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<Reading>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.history.history(limit).await)
}
