//! Index writer configuration and statistics.

use serde::{Deserialize, Serialize};

/// Index writer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexWriterConfig {
    /// Largest zig-zag delta blob (in bytes) persisted as small postings.
    /// Postings whose encoding does not fit are stored as a posting set.
    pub small_postings_capacity: usize,

    /// Initial size of the analyzer words buffer.
    pub initial_words_buffer_size: usize,

    /// Initial number of token slots of the analyzer token buffer.
    pub initial_tokens_buffer_size: usize,

    /// Fields with at least this many distinct terms sort them in parallel
    /// during commit.
    pub parallel_sort_threshold: usize,
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        IndexWriterConfig {
            small_postings_capacity: 32,
            initial_words_buffer_size: 1024,
            initial_tokens_buffer_size: 128,
            parallel_sort_threshold: 16 * 1024,
        }
    }
}

impl IndexWriterConfig {
    pub fn with_small_postings_capacity(mut self, capacity: usize) -> Self {
        self.small_postings_capacity = capacity;
        self
    }

    pub fn with_parallel_sort_threshold(mut self, threshold: usize) -> Self {
        self.parallel_sort_threshold = threshold;
        self
    }
}

/// Statistics about the writing process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Entries indexed by this writer.
    pub entries_indexed: u64,
    /// Entries deleted by this writer.
    pub entries_deleted: u64,
    /// Terms inserted into a term tree for the first time.
    pub terms_added: u64,
    /// Existing terms whose postings changed.
    pub terms_updated: u64,
    /// Terms removed because their postings became empty.
    pub terms_removed: u64,
    /// Terms persisted as a single inline entry.
    pub single_postings: u64,
    /// Terms persisted as a small delta blob.
    pub small_postings: u64,
    /// Terms persisted as (or merged into) a posting set.
    pub set_postings: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_serde() {
        let config = IndexWriterConfig::default();
        assert_eq!(config.small_postings_capacity, 32);

        let parsed: IndexWriterConfig =
            serde_json::from_str(r#"{"small_postings_capacity": 128}"#).unwrap();
        assert_eq!(parsed.small_postings_capacity, 128);
        assert_eq!(parsed.initial_words_buffer_size, config.initial_words_buffer_size);
    }
}
