//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and records.
//! These are testable in isolation without database access.

use std::collections::BTreeSet;

use dsentity_core::key::{encode_path, parse_storage_key, storage_key};
use dsentity_core::store::{Record, StoreError};
use dsentity_core::PropertyMap;
use rusqlite::Row;

/// Column values written for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRow {
    pub storage_key: String,
    pub namespace: String,
    pub kind: String,
    pub path: String,
    pub properties: String,
    pub unindexed: String,
}

/// Column values read back for one record.
///
/// Expected columns: storage_key, properties, unindexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub storage_key: String,
    pub properties: String,
    pub unindexed: String,
}

/// Convert a record with a complete key to its column values.
pub fn record_to_row(record: &Record) -> Result<EntityRow, StoreError> {
    Ok(EntityRow {
        storage_key: storage_key(&record.key)?,
        namespace: record.key.namespace().unwrap_or_default().to_string(),
        kind: record.key.kind().to_string(),
        path: encode_path(&record.key)?,
        properties: serde_json::to_string(&record.properties)
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        unindexed: serde_json::to_string(&record.exclude_from_indexes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
    })
}

/// Read the raw columns of a SELECT row.
pub fn read_row(row: &Row) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        storage_key: row.get(0)?,
        properties: row.get(1)?,
        unindexed: row.get(2)?,
    })
}

/// Convert stored columns back to a record, keeping its storage key.
pub fn row_to_record(row: StoredRow) -> Result<(String, Record), StoreError> {
    let key = parse_storage_key(&row.storage_key)?;
    let properties: PropertyMap = serde_json::from_str(&row.properties)
        .map_err(|e| StoreError::Serialization(format!("invalid properties: {e}")))?;
    let exclude_from_indexes: BTreeSet<String> = serde_json::from_str(&row.unindexed)
        .map_err(|e| StoreError::Serialization(format!("invalid unindexed list: {e}")))?;

    Ok((
        row.storage_key,
        Record {
            key,
            properties,
            exclude_from_indexes,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use dsentity_core::{Key, Value};

    fn sample_record() -> Record {
        let created_at = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Record::new(
            Key::with_id("Org", 1)
                .child("User", Some("alice".into()))
                .unwrap()
                .in_namespace(Some("tests".to_string())),
            PropertyMap::from([
                ("name", Value::from("Alice")),
                ("created_at", Value::from(created_at)),
                ("avatar", Value::bytes(vec![1u8, 2, 3])),
            ]),
        )
        .exclude_from_indexes(["avatar"])
    }

    #[test]
    fn test_record_to_row_columns() {
        let row = record_to_row(&sample_record()).unwrap();
        assert_eq!(row.namespace, "tests");
        assert_eq!(row.kind, "User");
        assert_eq!(row.path, "Org:i0000000000000000001/User:salice");
        assert_eq!(row.storage_key, format!("tests|{}", row.path));
        assert_eq!(row.unindexed, r#"["avatar"]"#);
    }

    #[test]
    fn test_row_to_record_restores_types() {
        let record = sample_record();
        let row = record_to_row(&record).unwrap();
        let (storage_key, restored) = row_to_record(StoredRow {
            storage_key: row.storage_key.clone(),
            properties: row.properties,
            unindexed: row.unindexed,
        })
        .unwrap();

        assert_eq!(storage_key, row.storage_key);
        assert_eq!(restored, record);
        assert!(matches!(
            restored.properties.get("created_at"),
            Some(Value::Timestamp(_))
        ));
    }

    #[test]
    fn test_record_to_row_rejects_incomplete_key() {
        let record = Record::new(Key::new("User"), PropertyMap::new());
        assert!(matches!(
            record_to_row(&record),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_row_to_record_invalid_json() {
        let result = row_to_record(StoredRow {
            storage_key: "|User:i0000000000000000001".to_string(),
            properties: "not json".to_string(),
            unindexed: "[]".to_string(),
        });
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
