//! Storage backends for readings and advisory audit records
//!
//! This module provides a trait-based abstraction over the document store the
//! hub writes to.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` trait allows swapping implementations
//! - **Async**: All operations are async for use from Tokio tasks
//! - **Shared**: one `Arc<dyn StorageBackend>` is handed to every component
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database file
//! - **In-Memory**: No persistence, for testing or throwaway runs
//!
//! ## Usage
//!
//! ```no_run
//! use greenhouse_hub::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./greenhouse.db").await?;
//!     let latest = backend.latest_reading().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::AdvisoryRecord;
