//! Actor-based ingestion
//!
//! Long-running work runs as an independent async task that owns its
//! resources and is driven through a cloneable handle.
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels carried inside commands
//! 3. **Events**: readings leave the actor through the [`Pipeline`](crate::pipeline::Pipeline),
//!    which persists them and publishes to the broadcast hub

pub mod ingest;
pub mod messages;
