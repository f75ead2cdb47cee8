//! Index writing: term accumulation, postings encoding and commit.
//!
//! An [`IndexWriter`](writer::IndexWriter) owns one write transaction. Field
//! values arrive through [`IndexEntryBuilder`](builder::IndexEntryBuilder),
//! are normalized or analyzed into terms and buffered per field until
//! [`commit`](writer::IndexWriter::commit) merges them into the persistent
//! term trees.
//!
//! Every term's postings are persisted in one of three shapes, picked by
//! cardinality (see [`PostingList`](postings::PostingList)): a single entry
//! id inline, a small zig-zag delta blob, or a posting set.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tessera::document::entry::{FieldValue, IndexEntryWriter};
//! use tessera::index::config::IndexWriterConfig;
//! use tessera::index::fields::{IndexFieldBinding, IndexFieldsMapping};
//! use tessera::index::writer::IndexWriter;
//! use tessera::search::matches::QueryMatch;
//! use tessera::search::searcher::IndexSearcher;
//! use tessera::storage::{StorageConfig, StorageEnvironment};
//!
//! # fn main() -> tessera::error::Result<()> {
//! let env = StorageEnvironment::new(StorageConfig::default());
//! let mut mapping = IndexFieldsMapping::new();
//! mapping.add(IndexFieldBinding::new(0, "status"))?;
//! let mapping = Arc::new(mapping);
//!
//! let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
//! let mut doc = IndexEntryWriter::new();
//! doc.write(0, FieldValue::Text(b"active"))?;
//! let entry_id = writer.index("users/1", &doc.finish())?;
//! writer.commit()?;
//!
//! let searcher = IndexSearcher::new(&env, mapping);
//! let mut query = searcher.term_query("status", "active")?;
//! assert_eq!(query.collect_all()?, vec![entry_id]);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod entry_terms;
pub mod fields;
pub mod merger;
pub mod names;
pub mod postings;
pub mod stored;
pub mod term_buffer;
pub mod writer;

/// Term indexed for explicit null values.
///
/// Starts with `0xFF`, which never occurs in UTF-8 text.
pub const NULL_VALUE_TERM: &[u8] = b"\xFFNULL_VALUE";

/// Term indexed for zero-length values.
pub const EMPTY_STRING_TERM: &[u8] = b"\xFFEMPTY_STRING";

/// Whether `term` is one of the reserved sentinel terms. Value queries
/// (ranges, prefixes, substrings) never match these.
pub fn is_reserved_term(term: &[u8]) -> bool {
    term.first() == Some(&0xFF)
}

/// Reject a user-supplied term that would collide with the sentinel range.
pub(crate) fn check_value_term(field: &str, term: &[u8]) -> crate::error::Result<()> {
    if is_reserved_term(term) {
        return Err(crate::error::TesseraError::invalid_operation(format!(
            "field '{field}': terms starting with byte 0xFF are reserved"
        )));
    }
    Ok(())
}
