//! Query side: term providers, composable matches and sorting.
//!
//! An [`IndexSearcher`](searcher::IndexSearcher) pins one committed snapshot
//! and builds matches from it. Term-shaped queries (ranges, prefixes,
//! suffixes, patterns, existence) are answered by a
//! [`TermProvider`](providers::TermProvider) walking the field's term tree
//! and a [`MultiTermMatch`](matches::MultiTermMatch) unioning the postings
//! of the terms it yields. Matches combine with AND, OR and AND NOT, and
//! [`SortingMatch`](sorting::SortingMatch) orders any match by term, number,
//! score, natural order, distance or a seeded shuffle.
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
//! use tessera::search::sorting::OrderMetadata;
//! use tessera::storage::{StorageConfig, StorageEnvironment};
//!
//! # fn main() -> tessera::error::Result<()> {
//! let env = StorageEnvironment::new(StorageConfig::default());
//! let mut mapping = IndexFieldsMapping::new();
//! mapping.add(IndexFieldBinding::new(0, "price"))?;
//! let mapping = Arc::new(mapping);
//!
//! let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
//! for price in [30i64, 10, 20] {
//!     let text = price.to_string();
//!     let mut doc = IndexEntryWriter::new();
//!     doc.write(0, FieldValue::Tuple { text: text.as_bytes(), long: price, double: price as f64 })?;
//!     writer.index(&format!("items/{price}"), &doc.finish())?;
//! }
//! writer.commit()?;
//!
//! let searcher = IndexSearcher::new(&env, mapping);
//! let cheap = searcher.less_than_or_equal("price", 20i64)?;
//! let mut sorted = searcher.order_by(cheap, OrderMetadata::long("price").descending())?;
//! assert_eq!(sorted.collect_all()?, vec![3, 2]);
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod config;
pub mod inspect;
pub mod matches;
pub mod providers;
pub mod searcher;
pub mod sorting;
