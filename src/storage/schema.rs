//! Stored record definitions
//!
//! ## Tables
//!
//! - `readings`: one row per reading. Channel values are typed columns so
//!   they can be queried; unknown payload keys go into the `extra` JSON column.
//! - `advisories`: the audit trail, one row per advisory exchange that
//!   reached the reasoning service.
//!
//! Timestamps are stored as Unix milliseconds. Identifiers are row ids,
//! handed to callers as opaque strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use crate::advisory::AdvisoryStatus;
use crate::reading::Reading;

/// Audit record of one advisory exchange
///
/// Written once, after the reasoning service answered or failed, and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: Option<String>,

    /// When the exchange completed
    pub timestamp: DateTime<Utc>,

    /// Channel values used as context
    pub t: Option<f64>,
    pub h: Option<f64>,
    pub l: Option<f64>,

    /// Free-form question, absent in report mode
    pub question: Option<String>,

    /// Synthesized answer, or the error text shown instead
    pub answer: String,

    pub status: AdvisoryStatus,
}

impl AdvisoryRecord {
    /// Record an exchange that used `context` as its input
    pub fn new(
        context: &Reading,
        question: Option<String>,
        answer: String,
        status: AdvisoryStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            t: context.t,
            h: context.h,
            l: context.l,
            question,
            answer,
            status,
        }
    }
}

/// Helper to convert timestamp to Unix milliseconds for storage
pub fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Helper to convert Unix milliseconds from storage to DateTime
///
/// A value chrono cannot represent is a corrupt row, not "now".
pub fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        StorageError::SerializationError(format!("timestamp {millis} ms is out of range"))
    })
}
