//! Persist-then-broadcast path shared by the ingestion loop and manual intake
//!
//! ```text
//! Reading ──► store.insert_reading() ──(id or error)──► hub.publish(SENSOR_EVENT)
//! ```
//!
//! Persistence is always attempted before the broadcast, and the broadcast
//! happens exactly once whether or not persistence succeeded. A reading that
//! could not be stored goes out without an `id`.

use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use crate::hub::{Broadcaster, SENSOR_EVENT};
use crate::reading::{Reading, SensorPayload};
use crate::storage::{StorageBackend, StorageError};

/// Outcome of delivering one reading
#[derive(Debug)]
pub struct Delivery {
    /// The reading as broadcast
    pub reading: Reading,

    /// Why persistence failed, if it did
    pub persist_error: Option<StorageError>,
}

impl Delivery {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Store and hub handles, cloned into every component that ingests readings
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn StorageBackend>,
    hub: Arc<dyn Broadcaster>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn StorageBackend>, hub: Arc<dyn Broadcaster>) -> Self {
        Self { store, hub }
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        &self.store
    }

    /// Persist a freshly decoded reading, then broadcast it
    #[instrument(skip_all, fields(origin = %reading.origin))]
    pub async fn deliver(&self, mut reading: Reading) -> Delivery {
        reading.id = None;

        let persist_error = match self.store.insert_reading(&reading).await {
            Ok(id) => {
                debug!("reading stored with id {id}");
                reading.id = Some(id);
                None
            }
            Err(e) => {
                warn!("failed to persist reading, broadcasting live-only: {e}");
                Some(e)
            }
        };

        match serde_json::to_value(&reading) {
            Ok(payload) => self.hub.publish(SENSOR_EVENT, payload),
            Err(e) => error!("failed to serialize reading for broadcast: {e}"),
        }

        Delivery {
            reading,
            persist_error,
        }
    }

    /// Stamp a client-submitted payload as manual and deliver it
    pub async fn submit_manual(&self, payload: SensorPayload) -> Delivery {
        self.deliver(Reading::manual(payload)).await
    }
}
