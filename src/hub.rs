//! Broadcast hub for live subscribers
//!
//! Publishing is fire-and-forget: every subscriber connected at publish time
//! gets the event, later subscribers only see later events, and nothing is
//! replayed. Slow subscribers lag and skip messages rather than slowing down
//! the publisher.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Event name used for every reading pushed to subscribers
pub const SENSOR_EVENT: &str = "sensor_reading";

/// Default buffer size of the broadcast channel
pub const DEFAULT_CAPACITY: usize = 256;

/// Publish-to-all-subscribers primitive
///
/// Implementations must tolerate concurrent publishers.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, event: &str, payload: Value);
}

/// One message delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubEvent {
    pub event: String,
    pub data: Value,
}

/// Broadcast hub backed by a Tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<HubEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster for BroadcastHub {
    fn publish(&self, event: &str, payload: Value) {
        let event = HubEvent {
            event: event.to_string(),
            data: payload,
        };

        // No subscribers is not an error
        match self.tx.send(event) {
            Ok(receivers) => trace!("published event to {receivers} subscribers"),
            Err(_) => trace!("no subscribers for event"),
        }
    }
}
