use thiserror::Error;

use crate::key::KeyError;

/// Errors that can occur during store operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
}

impl From<KeyError> for StoreError {
    fn from(err: KeyError) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
