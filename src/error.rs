//! Error types for the Segmerge library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`SegmergeError`] enum.
//!
//! # Examples
//!
//! ```
//! use segmerge::error::{Result, SegmergeError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(SegmergeError::config("segment_count must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Segmerge operations.
#[derive(Error, Debug)]
pub enum SegmergeError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid schema (empty group list, dangling module, duplicate dictionary).
    #[error("Schema error: {0}")]
    Schema(String),

    /// Two schemas differ where they must agree.
    #[error("Schema mismatch on {field}: {detail}")]
    SchemaMismatch { field: String, detail: String },

    /// Invalid merge or strategy configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Merge execution errors
    #[error("Merge error: {0}")]
    Merge(String),

    /// On-disk data failed to decode or verify.
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors raised by external collaborators
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with SegmergeError.
pub type Result<T> = std::result::Result<T, SegmergeError>;

impl SegmergeError {
    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        SegmergeError::Schema(msg.into())
    }

    /// Create a new schema mismatch error for the first diverging field.
    pub fn mismatch<F: Into<String>, D: Into<String>>(field: F, detail: D) -> Self {
        SegmergeError::SchemaMismatch {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SegmergeError::Config(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        SegmergeError::Storage(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        SegmergeError::Index(msg.into())
    }

    /// Create a new merge error.
    pub fn merge<S: Into<String>>(msg: S) -> Self {
        SegmergeError::Merge(msg.into())
    }

    /// Create a new corrupt data error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        SegmergeError::Corrupt(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SegmergeError::Other(msg.into())
    }
}
