//! API shared state

use std::sync::Arc;

use crate::actors::ingest::IngestHandle;
use crate::advisory::AdvisoryService;
use crate::history::HistoryService;
use crate::hub::BroadcastHub;
use crate::pipeline::Pipeline;
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
///
/// Every field is a cheap handle; cloning the state clones handles only.
#[derive(Clone)]
pub struct ApiState {
    /// Persist-then-broadcast path used by manual intake
    pub pipeline: Pipeline,

    pub history: HistoryService,

    pub advisory: AdvisoryService,

    /// Live subscribers attach here
    pub hub: BroadcastHub,

    /// Handle to the ingestion loop, absent when it failed to bind
    pub ingest: Option<IngestHandle>,
}

impl ApiState {
    /// Build the state around an already wired pipeline and hub
    pub fn new(pipeline: Pipeline, hub: BroadcastHub, advisory: AdvisoryService) -> Self {
        Self {
            history: HistoryService::new(pipeline.store().clone()),
            pipeline,
            advisory,
            hub,
            ingest: None,
        }
    }

    pub fn with_ingest(mut self, ingest: IngestHandle) -> Self {
        self.ingest = Some(ingest);
        self
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        self.pipeline.store()
    }
}
