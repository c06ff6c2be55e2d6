//! Advisory failure modes
//!
//! Every variant renders as a sentence suitable for showing to the operator
//! in place of an answer.

use std::fmt;
use std::time::Duration;

/// Longest slice of an error body quoted back to the caller
const MAX_QUOTED_BODY: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub enum AdvisoryError {
    /// No credential configured; nothing was sent
    MissingCredential,

    /// The service did not answer in time
    Timeout(Duration),

    /// The service answered with a non-success status
    Status { status: u16, body: String },

    /// The request never completed (DNS, connect, TLS, ...)
    Transport(String),

    /// The service answered 2xx but the body was not usable
    InvalidResponse(String),
}

impl AdvisoryError {
    /// Build a `Status` error, quoting at most the first part of the body
    pub fn status(status: u16, body: &str) -> Self {
        AdvisoryError::Status {
            status,
            body: body.trim().chars().take(MAX_QUOTED_BODY).collect(),
        }
    }
}

impl fmt::Display for AdvisoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryError::MissingCredential => write!(
                f,
                "The advisory service is not configured: set ADVISOR_API_KEY to enable it."
            ),
            AdvisoryError::Timeout(after) => write!(
                f,
                "The advisory service did not respond within {:?}. Please try again.",
                after
            ),
            AdvisoryError::Status { status, body } if body.is_empty() => {
                write!(f, "The advisory service returned HTTP {status}.")
            }
            AdvisoryError::Status { status, body } => {
                write!(f, "The advisory service returned HTTP {status}: {body}")
            }
            AdvisoryError::Transport(msg) => {
                write!(f, "Could not reach the advisory service: {msg}")
            }
            AdvisoryError::InvalidResponse(msg) => {
                write!(f, "The advisory service returned an unreadable response: {msg}")
            }
        }
    }
}

impl std::error::Error for AdvisoryError {}
