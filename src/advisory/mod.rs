//! Advisory service: a synthesized diagnosis or answer for the latest reading
//!
//! ## Flow
//!
//! ```text
//! fetch latest reading ──none──► "no data" reply
//!        │
//!        ▼
//! build prompt (report | chat)
//!        │
//!        ▼
//! advisor.advise() ──MissingCredential──► "not configured" reply
//!        │ answer or error text
//!        ▼
//! audit record (best effort) ──► reply
//! ```
//!
//! The caller always gets text back. Failures of the reasoning service become
//! the advisory text itself and are audited like any answer.

pub mod client;
pub mod error;
pub mod prompt;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use client::ChatCompletionsClient;
pub use error::AdvisoryError;
pub use prompt::{Audience, Prompt, PromptMode};

use crate::reading::ingestion_time;
use crate::storage::{AdvisoryRecord, StorageBackend};

/// Reply used when no reading has been stored yet
pub const NO_DATA_MESSAGE: &str =
    "No sensor readings are available yet, so there is nothing to analyse.";

/// Reply used when the store cannot be read
pub const STORE_UNAVAILABLE_MESSAGE: &str =
    "Sensor history is unavailable right now; please try again shortly.";

/// Narrow interface to the external reasoning service
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, prompt: &Prompt) -> Result<String, AdvisoryError>;
}

/// How an advisory request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryStatus {
    /// The reasoning service answered
    Answered,

    /// No reading to base an answer on
    NoData,

    /// No credential configured
    NotConfigured,

    /// The reasoning service failed; the text explains how
    ServiceError,
}

impl fmt::Display for AdvisoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryStatus::Answered => write!(f, "answered"),
            AdvisoryStatus::NoData => write!(f, "no_data"),
            AdvisoryStatus::NotConfigured => write!(f, "not_configured"),
            AdvisoryStatus::ServiceError => write!(f, "service_error"),
        }
    }
}

impl FromStr for AdvisoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "answered" => Ok(AdvisoryStatus::Answered),
            "no_data" => Ok(AdvisoryStatus::NoData),
            "not_configured" => Ok(AdvisoryStatus::NotConfigured),
            "service_error" => Ok(AdvisoryStatus::ServiceError),
            other => Err(format!("unknown advisory status '{other}'")),
        }
    }
}

/// Text returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryReply {
    pub advice: String,
    pub status: AdvisoryStatus,
}

impl AdvisoryReply {
    fn new(advice: impl Into<String>, status: AdvisoryStatus) -> Self {
        Self {
            advice: advice.into(),
            status,
        }
    }
}

#[derive(Clone)]
pub struct AdvisoryService {
    store: Arc<dyn StorageBackend>,
    advisor: Arc<dyn Advisor>,
    max_tokens: u32,
}

impl AdvisoryService {
    pub fn new(store: Arc<dyn StorageBackend>, advisor: Arc<dyn Advisor>, max_tokens: u32) -> Self {
        Self {
            store,
            advisor,
            max_tokens,
        }
    }

    /// Produce advice for the latest reading
    ///
    /// `question` selects chat mode when present and non-blank.
    #[instrument(skip_all, fields(audience = ?audience))]
    pub async fn advise(&self, question: Option<String>, audience: Audience) -> AdvisoryReply {
        let context = match self.store.latest_reading().await {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                debug!("no readings stored, skipping advisory call");
                return AdvisoryReply::new(NO_DATA_MESSAGE, AdvisoryStatus::NoData);
            }
            Err(e) => {
                warn!("could not load latest reading: {e}");
                return AdvisoryReply::new(STORE_UNAVAILABLE_MESSAGE, AdvisoryStatus::NoData);
            }
        };

        let question = question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        let prompt = Prompt::build(&context, question.as_deref(), audience, self.max_tokens);

        let (answer, status) = match self.advisor.advise(&prompt).await {
            Ok(answer) => (answer, AdvisoryStatus::Answered),
            Err(AdvisoryError::MissingCredential) => {
                warn!("advisory requested but no credential is configured");
                return AdvisoryReply::new(
                    AdvisoryError::MissingCredential.to_string(),
                    AdvisoryStatus::NotConfigured,
                );
            }
            Err(e) => {
                warn!("advisory call failed: {e:?}");
                (e.to_string(), AdvisoryStatus::ServiceError)
            }
        };

        let record = AdvisoryRecord::new(&context, question, answer.clone(), status, ingestion_time());
        match self.store.insert_advisory(&record).await {
            Ok(id) => info!("advisory {id} recorded ({status})"),
            Err(e) => warn!("failed to record advisory: {e}"),
        }

        AdvisoryReply::new(answer, status)
    }
}
