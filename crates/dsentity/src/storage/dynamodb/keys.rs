//! DynamoDB key generation functions.
//!
//! Pure functions for the single-table layout. Every record is one item whose
//! partition key is the record's storage key; the `KindIndex` GSI groups
//! items by namespace and kind, sorted by storage key.

use dsentity_core::key::{ancestor_prefix, namespace_prefix, storage_key, Key, KeyError};

// ============================================================================
// Attribute names
// ============================================================================

pub const PK: &str = "PK";
pub const KIND_NS: &str = "KIND_NS";
pub const PROPS: &str = "props";
pub const TYPES: &str = "types";
pub const ORDER: &str = "order";
pub const UNINDEXED: &str = "unindexed";
pub const NEXT_ID: &str = "next_id";

pub const KIND_INDEX: &str = "KindIndex";

pub const SEQUENCE_PREFIX: &str = "__seq__#";

/// Upper bound appended to a prefix for `BETWEEN` key conditions.
pub const PREFIX_END: char = '\u{10FFFF}';

// ============================================================================
// Entity keys
// ============================================================================

/// Generate the partition key of a record.
///
/// Pattern: `<namespace>|<path>` (the storage key)
pub fn entity_pk(key: &Key) -> Result<String, KeyError> {
    storage_key(key)
}

/// Generate the `KindIndex` partition key.
///
/// Pattern: `<namespace>|<kind>`
pub fn kind_ns(namespace: Option<&str>, kind: &str) -> String {
    format!("{}{kind}", namespace_prefix(namespace))
}

/// Generate the `KindIndex` partition key of a record.
pub fn entity_kind_ns(key: &Key) -> String {
    kind_ns(key.namespace(), key.kind())
}

/// Bounds of the sort key range holding `ancestor` and its descendants.
///
/// Pattern: `[<ancestor pk>, <ancestor pk>/<max char>]`. The range may also
/// hold a few unrelated keys, so results still need an ancestor check.
pub fn ancestor_range(ancestor: &Key) -> Result<(String, String), KeyError> {
    let lower = storage_key(ancestor)?;
    let upper = format!("{}{PREFIX_END}", ancestor_prefix(ancestor)?);
    Ok((lower, upper))
}

// ============================================================================
// Id sequences
// ============================================================================

/// Generate the partition key of an id counter.
///
/// Pattern: `__seq__#<namespace>|<kind>`
pub fn sequence_pk(namespace: Option<&str>, kind: &str) -> String {
    format!("{SEQUENCE_PREFIX}{}", kind_ns(namespace, kind))
}
