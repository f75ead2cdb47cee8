//! # Tessera
//!
//! An inverted-index writer and term-range query engine.
//!
//! ## Features
//!
//! - Per-field term accumulation with exact and analyzed ("search") modes
//! - Postings persisted inline, as small delta blobs, or as posting sets,
//!   chosen by cardinality at commit
//! - Range, prefix, suffix, substring, pattern and existence queries over
//!   textual, long and double terms
//! - Composable AND / OR / AND NOT matches with bounded tree depth
//! - Batched sorting by term, number, score, natural order, distance or a
//!   seeded shuffle
//! - Entry deletion, stored fields, document boosts and suggestions

pub mod analysis;
pub mod document;
pub mod error;
pub mod index;
pub mod search;
pub mod storage;
pub mod util;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
