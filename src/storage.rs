//! Transactional storage layer consumed by the index writer and searcher.
//!
//! The engine only needs a handful of primitives from its store, and this
//! module provides them as an in-memory, copy-on-write implementation:
//!
//! - **Containers**: a blob allocator (`allocate`, `container`,
//!   `container_mut`, `delete_container`) holding small postings blobs, set
//!   state blocks, term dictionary bytes and stored-field values.
//! - **Term trees**: per-field ordered maps from a term key (bytes, `i64` or
//!   IEEE-ordered `f64`) to a packed postings value, with seekable forward
//!   and backward iteration.
//! - **Posting sets**: persistent sorted sets of entry ids described by a
//!   fixed-size [`SetState`] blob stored in a container.
//! - **Lookups**: entry-keyed `i64` maps used for term ids, numeric sort
//!   values, boosts and per-entry records.
//! - **Transactions**: [`StorageEnvironment`] hands out snapshot
//!   [`ReadTransaction`]s and a single [`WriteTransaction`] at a time; a
//!   write transaction becomes visible atomically on commit and is discarded
//!   on rollback or drop.
//!
//! # Example
//!
//! ```
//! use tessera::storage::{StorageConfig, StorageEnvironment};
//!
//! # fn main() -> tessera::error::Result<()> {
//! let env = StorageEnvironment::new(StorageConfig::default());
//!
//! let mut txn = env.write_transaction();
//! let id = txn.allocate(b"hello");
//! txn.commit()?;
//!
//! let snapshot = env.read_transaction();
//! assert_eq!(snapshot.container(id)?, b"hello");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;

pub mod container;
pub mod environment;
pub mod lookup;
pub mod set;
pub mod tree;

pub use container::{ContainerId, ContainerStore};
pub use environment::{ReadTransaction, StorageEnvironment, StoreState, WriteTransaction};
pub use lookup::Lookup;
pub use set::{PostingSet, SetState};
pub use tree::{Backward, DoubleKey, Forward, IterationDirection, TermTree, TermTreeValue, TreeIterator, TreeKey};

/// Configuration for a [`StorageEnvironment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Number of container slots per copy-on-write page.
    pub container_page_slots: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            container_page_slots: 256,
        }
    }
}

/// Errors raised by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Container id does not reference a live container.
    ContainerNotFound(ContainerId),

    /// Set state references a set that does not exist.
    SetNotFound(u64),

    /// A write transaction is already open on this environment.
    WriterBusy,

    /// Invalid operation.
    InvalidOperation(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::ContainerNotFound(id) => write!(f, "Container not found: {id}"),
            StorageError::SetNotFound(root) => write!(f, "Posting set not found: {root}"),
            StorageError::WriterBusy => write!(f, "A write transaction is already active"),
            StorageError::InvalidOperation(msg) => write!(f, "Invalid operation: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for TesseraError {
    fn from(err: StorageError) -> Self {
        TesseraError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.container_page_slots, 256);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::ContainerNotFound(12);
        assert_eq!(err.to_string(), "Container not found: 12");

        let err = StorageError::WriterBusy;
        assert_eq!(err.to_string(), "A write transaction is already active");

        let err: TesseraError = StorageError::SetNotFound(3).into();
        assert_eq!(err.to_string(), "Storage error: Posting set not found: 3");
    }
}
