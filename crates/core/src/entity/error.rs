use thiserror::Error;

use crate::key::KeyError;
use crate::store::StoreError;

/// Errors raised by entity operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EntityError {
    #[error("You must specify the entity kind for this model")]
    MissingKind,
    #[error("Entity is not connected to a store")]
    NotConnected,
    #[error("Entity has no key")]
    MissingKey,
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for entity operations.
pub type Result<T> = std::result::Result<T, EntityError>;
