//! Index searcher configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

/// Largest sort batch. Batch positions are packed into 16 bits.
pub const MAX_SORT_BATCH_SIZE: usize = 1 << 16;

/// Index searcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSearcherConfig {
    /// Number of entries sorted together before runs are merged.
    pub sort_batch_size: usize,

    /// Entry count above which [`debug_dump`](crate::search::searcher::IndexSearcher::debug_dump)
    /// refuses to run.
    pub max_entries_for_debug_dump: u64,
}

impl Default for IndexSearcherConfig {
    fn default() -> Self {
        IndexSearcherConfig {
            sort_batch_size: 4096,
            max_entries_for_debug_dump: 65_536,
        }
    }
}

impl IndexSearcherConfig {
    pub fn with_sort_batch_size(mut self, size: usize) -> Self {
        self.sort_batch_size = size;
        self
    }

    pub fn with_max_entries_for_debug_dump(mut self, max: u64) -> Self {
        self.max_entries_for_debug_dump = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sort_batch_size == 0 || self.sort_batch_size > MAX_SORT_BATCH_SIZE {
            return Err(TesseraError::invalid_operation(format!(
                "sort_batch_size must be between 1 and {MAX_SORT_BATCH_SIZE}, got {}",
                self.sort_batch_size
            )));
        }
        Ok(())
    }
}
