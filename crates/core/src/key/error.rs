use thiserror::Error;

/// Errors that can occur when building, validating or decoding a key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Key path is empty")]
    EmptyPath,
    #[error("Key kind must be text, got id {0}")]
    KindNotText(i64),
    #[error("Key kind must not be empty")]
    EmptyKind,
    #[error("Key id must be positive, got {0}")]
    InvalidId(i64),
    #[error("Key name must not be empty")]
    EmptyName,
    #[error("Key is incomplete: {0}")]
    Incomplete(String),
    #[error("Key is already complete: {0}")]
    AlreadyComplete(String),
    #[error("Malformed encoded key: {0}")]
    Malformed(String),
}
