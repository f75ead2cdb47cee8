//! Error types for the Tessera library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TesseraError`] enum. Variants follow the failure taxonomy of the engine:
//! usage errors (`Field`, `Query`, `Analysis`, `InvalidOperation`), data and
//! format errors (`Format`, `Storage`), guardrails (`ResourceExhausted`) and
//! cooperative cancellation (`OperationCancelled`).
//!
//! # Examples
//!
//! ```
//! use tessera::error::{Result, TesseraError};
//!
//! fn build_query(op: &str) -> Result<()> {
//!     Err(TesseraError::query(format!("unsupported operator: {op}")))
//! }
//!
//! let err = build_query("~").unwrap_err();
//! assert_eq!(err.to_string(), "Query error: unsupported operator: ~");
//! ```

use thiserror::Error;

/// The main error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Index-related errors (writer lifecycle, commit failures).
    #[error("Index error: {0}")]
    Index(String),

    /// Analysis-related errors (tokenization, single-term violations).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Query construction errors (unsupported values or operators).
    #[error("Query error: {0}")]
    Query(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Field-related errors (unknown field, bad field type).
    #[error("Field error: {0}")]
    Field(String),

    /// Persisted data that cannot be decoded.
    #[error("Format error: {0}")]
    Format(String),

    /// Operation cancelled through a cancellation token.
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// Invalid operation for the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Operational limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Binary serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        TesseraError::Index(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        TesseraError::Analysis(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        TesseraError::Query(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        TesseraError::Storage(msg.into())
    }

    /// Create a new field error.
    pub fn field<S: Into<String>>(msg: S) -> Self {
        TesseraError::Field(msg.into())
    }

    /// Create a new format error.
    pub fn format<S: Into<String>>(msg: S) -> Self {
        TesseraError::Format(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidOperation(msg.into())
    }

    /// Create a new resource exhausted error.
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        TesseraError::ResourceExhausted(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        TesseraError::OperationCancelled(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = TesseraError::index("Test index error");
        assert_eq!(error.to_string(), "Index error: Test index error");

        let error = TesseraError::format("bad tag 7");
        assert_eq!(error.to_string(), "Format error: bad tag 7");

        let error = TesseraError::cancelled("in_query");
        assert_eq!(error.to_string(), "Operation cancelled: in_query");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
        let error = TesseraError::from(json_error);

        match error {
            TesseraError::Json(_) => {}
            _ => panic!("Expected JSON error variant"),
        }
    }
}
