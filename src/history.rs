//! Recent-readings query
//!
//! Backs `GET /history`. This query never fails: a store error is logged and
//! answered with an empty list.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::reading::Reading;
use crate::storage::StorageBackend;

/// Limit used when the caller does not ask for one
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Upper bound on a single history request
pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn StorageBackend>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self { store }
    }

    /// The most recent readings, newest first, at most `limit` of them
    #[instrument(skip(self))]
    pub async fn history(&self, limit: usize) -> Vec<Reading> {
        let limit = limit.min(MAX_HISTORY_LIMIT);
        if limit == 0 {
            return Vec::new();
        }

        match self.store.recent_readings(limit).await {
            Ok(mut readings) => {
                readings.truncate(limit);
                readings
            }
            Err(e) => {
                warn!("history query failed, returning no data: {e}");
                Vec::new()
            }
        }
    }
}
