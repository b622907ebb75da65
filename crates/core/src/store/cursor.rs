use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{Result, StoreError};

/// Opaque continuation token of a paginated query.
///
/// Callers pass it back unchanged; only the store that produced it knows
/// what it encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Normalizes a byte token to text.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        std::str::from_utf8(bytes)
            .map(Self::new)
            .map_err(|e| StoreError::InvalidCursor(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cursor pointing just past `position` (a storage key).
    pub fn encode_position(position: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(position))
    }

    /// Recovers the storage key written by [`Cursor::encode_position`].
    pub fn decode_position(&self) -> Result<String> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|e| StoreError::InvalidCursor(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| StoreError::InvalidCursor(e.to_string()))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}
