//! Text analysis for indexed fields.
//!
//! Analyzers turn the raw bytes of a field value into token spans over a
//! words buffer supplied by the caller. The buffers are owned by whoever
//! drives the analysis (the index writer keeps one pair for its whole
//! lifetime), so an analyzer never allocates per value.
//!
//! # Analyzers
//!
//! - [`StandardAnalyzer`](analyzer::standard::StandardAnalyzer) - Unicode word
//!   boundaries (UAX #29) with lowercase normalization
//! - [`KeywordAnalyzer`](analyzer::keyword::KeywordAnalyzer) - the whole value
//!   as one token
//!
//! # Example
//!
//! ```
//! use tessera::analysis::analyzer::AnalyzerBuffers;
//! use tessera::analysis::analyzer::standard::StandardAnalyzer;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let mut buffers = AnalyzerBuffers::default();
//! let count = buffers.run(&StandardAnalyzer::new(), "Hello, World".as_bytes())?;
//!
//! assert_eq!(count, 2);
//! assert_eq!(buffers.token_bytes(0), b"hello");
//! assert_eq!(buffers.token_bytes(1), b"world");
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod token;
