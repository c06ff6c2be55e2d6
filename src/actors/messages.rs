//! Message types for actor communication
//!
//! Commands travel over an mpsc channel to one actor; answers come back on a
//! oneshot channel carried inside the command.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

/// Commands that can be sent to the IngestActor
#[derive(Debug)]
pub enum IngestCommand {
    /// Snapshot the ingestion counters
    GetStats {
        respond_to: oneshot::Sender<IngestStats>,
    },

    /// Stop receiving and release the socket
    ///
    /// The final counters are sent back once the socket is closed.
    Shutdown {
        respond_to: Option<oneshot::Sender<IngestStats>>,
    },
}

/// Counters kept by the ingestion loop
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    /// Datagrams taken off the socket
    pub packets_received: u64,

    /// Datagrams that decoded into named channels
    pub structured: u64,

    /// Datagrams kept only as raw text
    pub unstructured: u64,

    /// Readings stored with an identifier
    pub persisted: u64,

    /// Readings broadcast without an identifier
    pub persist_failures: u64,

    /// Iterations that failed and triggered the backoff
    pub iteration_errors: u64,

    pub last_packet_at: Option<DateTime<Utc>>,
}
