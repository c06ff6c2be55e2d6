//! Advisory endpoints

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde_json::Value;
use tracing::debug;

use crate::advisory::{AdvisoryReply, Audience};
use crate::api::{error::ApiResult, state::ApiState, types::LimitQuery};
use crate::storage::AdvisoryRecord;

const DEFAULT_AUDIT_LIMIT: usize = 20;
const MAX_AUDIT_LIMIT: usize = 200;

/// Keys the question may arrive under; the companion app sends `pregunta`
const QUESTION_KEYS: [&str; 2] = ["question", "pregunta"];

/// Keys naming the requesting client; the companion app sends `origen`
const SOURCE_KEYS: [&str; 2] = ["source", "origen"];

/// Client names that ask for short answers
const MOBILE_SOURCES: [&str; 2] = ["mobile", "movil"];

/// First string value found under any of `keys`
fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_str))
}

/// Extract the question and audience from a possibly empty or malformed body
///
/// Anything unreadable falls back to a dashboard report.
fn parse_request(body: &[u8]) -> (Option<String>, Audience) {
    if body.iter().all(u8::is_ascii_whitespace) {
        return (None, Audience::Dashboard);
    }

    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            debug!("ignoring unreadable advisory body: {e}");
            return (None, Audience::Dashboard);
        }
    };

    let question = first_str(&value, &QUESTION_KEYS).map(str::to_string);

    let audience = match first_str(&value, &SOURCE_KEYS) {
        Some(source)
            if MOBILE_SOURCES
                .iter()
                .any(|mobile| source.trim().eq_ignore_ascii_case(mobile)) =>
        {
            Audience::Mobile
        }
        _ => Audience::Dashboard,
    };

    (question, audience)
}

/// POST /advisory
///
/// Always 200; failures of the reasoning service come back as advice text
/// with a non-"answered" status.
pub async fn request_advisory(State(state): State<ApiState>, body: Bytes) -> Json<AdvisoryReply> {
    let (question, audience) = parse_request(&body);
    Json(state.advisory.advise(question, audience).await)
}

/// GET /advisory/history?limit=N
///
/// Recent advisory audit records, newest first
pub async fn advisory_history(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<AdvisoryRecord>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);

    Ok(Json(state.store().recent_advisories(limit).await?))
}
