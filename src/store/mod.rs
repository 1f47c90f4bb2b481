//! Persistence boundary for treasury snapshots.
//!
//! The engine itself never touches storage; callers take a snapshot after a
//! transaction and hand it to a `TreasuryStore`.

pub mod file;
pub mod mock;

pub use file::FileStore;
pub use mock::MemoryStore;

use crate::serialization::{SerializationError, SnapshotEnvelope};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Trait abstraction over snapshot storage.
#[async_trait]
pub trait TreasuryStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one.
    async fn save_snapshot(&self, snapshot: &SnapshotEnvelope) -> StoreResult<()>;

    /// Load the latest snapshot, or `None` if nothing was saved yet.
    async fn load_snapshot(&self) -> StoreResult<Option<SnapshotEnvelope>>;
}
