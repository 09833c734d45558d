//! Error types for the document store
//!
//! This module defines the error type shared by every collaborator trait and
//! by the counting layer. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.

use crate::mutation::BatchId;
use thiserror::Error;

/// Result type alias for document store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the document store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Invalid operation or state (e.g. querying an engine before it was initialized)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A path could not be used where a document key or collection was expected
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The mutation queue holds no batch with this id
    #[error("Mutation batch not found: {0}")]
    BatchNotFound(BatchId),

    /// Storage layer error raised by a collaborator
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::InvalidOperation`]
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        StoreError::InvalidOperation(msg.into())
    }

    /// Shorthand for [`StoreError::Storage`]
    pub fn storage(msg: impl Into<String>) -> Self {
        StoreError::Storage(msg.into())
    }
}
