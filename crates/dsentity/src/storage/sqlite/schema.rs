//! SQLite schema definitions and SQL query constants.
//!
//! Pure data, no I/O. Entities live in a single table keyed by their
//! storage key; properties are stored as JSON and filtered in process.

/// SQL statement to create all tables.
pub const CREATE_TABLES: &str = r#"
-- Entities table
CREATE TABLE IF NOT EXISTS entities (
    storage_key TEXT PRIMARY KEY,
    namespace TEXT NOT NULL,
    kind TEXT NOT NULL,
    path TEXT NOT NULL,
    properties TEXT NOT NULL,
    unindexed TEXT NOT NULL
);

-- Id sequences per namespace and kind
CREATE TABLE IF NOT EXISTS id_sequences (
    namespace TEXT NOT NULL,
    kind TEXT NOT NULL,
    next_id INTEGER NOT NULL,
    PRIMARY KEY (namespace, kind)
);

-- Indexes for efficient queries
CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(namespace, kind, storage_key);
"#;

// Entity queries
pub const UPSERT_ENTITY: &str = r#"
INSERT OR REPLACE INTO entities (storage_key, namespace, kind, path, properties, unindexed)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

pub const SELECT_ENTITY_BY_KEY: &str = r#"
SELECT storage_key, properties, unindexed
FROM entities
WHERE storage_key = ?1
"#;

pub const DELETE_ENTITY: &str = r#"
DELETE FROM entities
WHERE storage_key = ?1
"#;

pub const SELECT_ENTITIES_BY_KIND: &str = r#"
SELECT storage_key, properties, unindexed
FROM entities
WHERE namespace = ?1 AND kind = ?2 AND storage_key > ?3
ORDER BY storage_key ASC
"#;

pub const SELECT_ENTITIES_BY_ANCESTOR: &str = r#"
SELECT storage_key, properties, unindexed
FROM entities
WHERE namespace = ?1 AND kind = ?2 AND storage_key > ?3
  AND (storage_key = ?4 OR substr(storage_key, 1, length(?5)) = ?5)
ORDER BY storage_key ASC
"#;

// Id sequence queries
pub const INIT_SEQUENCE: &str = r#"
INSERT INTO id_sequences (namespace, kind, next_id)
VALUES (?1, ?2, 0)
ON CONFLICT (namespace, kind) DO NOTHING
"#;

pub const ADVANCE_SEQUENCE: &str = r#"
UPDATE id_sequences
SET next_id = next_id + ?3
WHERE namespace = ?1 AND kind = ?2
RETURNING next_id
"#;

pub const RAISE_SEQUENCE: &str = r#"
INSERT INTO id_sequences (namespace, kind, next_id)
VALUES (?1, ?2, ?3)
ON CONFLICT (namespace, kind) DO UPDATE SET next_id = MAX(next_id, excluded.next_id)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_valid_sql() {
        assert!(CREATE_TABLES.contains("CREATE TABLE IF NOT EXISTS entities"));
        assert!(CREATE_TABLES.contains("CREATE TABLE IF NOT EXISTS id_sequences"));
    }

    #[test]
    fn test_queries_contain_expected_keywords() {
        assert!(UPSERT_ENTITY.contains("INSERT OR REPLACE"));
        assert!(SELECT_ENTITY_BY_KEY.contains("SELECT"));
        assert!(DELETE_ENTITY.contains("DELETE"));
        assert!(SELECT_ENTITIES_BY_KIND.contains("ORDER BY storage_key"));
        assert!(SELECT_ENTITIES_BY_ANCESTOR.contains("substr"));
        assert!(ADVANCE_SEQUENCE.contains("RETURNING"));
        assert!(RAISE_SEQUENCE.contains("MAX(next_id, excluded.next_id)"));
    }
}
