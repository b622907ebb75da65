//! SQLite store implementation.

use async_trait::async_trait;
use rusqlite::params;
use tokio_rusqlite::Connection;

use dsentity_core::key::{ancestor_prefix, storage_key, Key, KeyId};
use dsentity_core::store::{
    collect_page, Datastore, Query, QueryPage, Record, Result, StoreError,
};

use super::conversions::{read_row, record_to_row, row_to_record, StoredRow};
use super::error::{map_tokio_rusqlite_error, Operation};
use super::schema;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

/// SQLite-based store.
///
/// Clones share the same connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
    namespace: Option<String>,
}

impl SqliteStore {
    /// Creates a store backed by a database file.
    ///
    /// The file is created if it doesn't exist. Schema tables are created
    /// automatically.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self {
            conn,
            namespace: None,
        })
    }

    /// Creates a store backed by an in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self {
            conn,
            namespace: None,
        })
    }

    /// Returns a handle on the same database scoped to another namespace.
    pub fn with_namespace(&self, namespace: Option<String>) -> Self {
        Self {
            conn: self.conn.clone(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
        }
    }

    /// Initialize the database schema.
    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES).map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| map_tokio_rusqlite_error(e, Operation::Write))
    }

    /// Reserves `count` ids for the key's namespace and kind, returning the
    /// first one.
    async fn reserve_ids(&self, key: &Key, count: usize) -> Result<i64> {
        let namespace = key.namespace().unwrap_or_default().to_string();
        let kind = key.kind().to_string();
        let count = count as i64;

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                let last = advance_sequence(&tx, &namespace, &kind, count).map_err(wrap_err)?;
                tx.commit().map_err(wrap_err)?;
                Ok(last - count + 1)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, Operation::Write))
    }
}

/// Moves the sequence forward by `count`, returning the last reserved id.
fn advance_sequence(
    tx: &rusqlite::Transaction<'_>,
    namespace: &str,
    kind: &str,
    count: i64,
) -> rusqlite::Result<i64> {
    tx.execute(schema::INIT_SEQUENCE, params![namespace, kind])?;
    tx.query_row(
        schema::ADVANCE_SEQUENCE,
        params![namespace, kind, count],
        |row| row.get(0),
    )
}

/// Completes the record's key and writes it inside `tx`.
///
/// Explicit numeric ids raise the sequence so later auto ids skip them.
fn write_record(
    tx: &rusqlite::Transaction<'_>,
    record: Record,
) -> rusqlite::Result<Result<Key>> {
    let namespace = record.key.namespace().unwrap_or_default().to_string();
    let kind = record.key.kind().to_string();

    let key = match record.key.id() {
        Some(KeyId::Id(id)) => {
            tx.execute(schema::RAISE_SEQUENCE, params![namespace, kind, id])?;
            record.key.clone()
        }
        Some(KeyId::Name(_)) => record.key.clone(),
        None => {
            let id = advance_sequence(tx, &namespace, &kind, 1)?;
            match record.key.completed(id) {
                Ok(key) => key,
                Err(e) => return Ok(Err(e.into())),
            }
        }
    };
    let row = match record_to_row(&Record {
        key: key.clone(),
        ..record
    }) {
        Ok(row) => row,
        Err(e) => return Ok(Err(e)),
    };

    tx.execute(
        schema::UPSERT_ENTITY,
        params![
            row.storage_key,
            row.namespace,
            row.kind,
            row.path,
            row.properties,
            row.unindexed
        ],
    )?;
    Ok(Ok(key))
}

#[async_trait]
impl Datastore for SqliteStore {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    async fn get(&self, key: &Key) -> Result<Option<Record>> {
        let storage_key = storage_key(key)?;

        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_ENTITY_BY_KEY)
                    .map_err(wrap_err)?;
                match stmt.query_row([&storage_key], read_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, Operation::Read))?;

        match row {
            Some(row) => Ok(Some(row_to_record(row)?.1)),
            None => Ok(None),
        }
    }

    async fn put(&self, record: Record) -> Result<Key> {
        let key = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                let key = write_record(&tx, record).map_err(wrap_err)?;
                if key.is_ok() {
                    tx.commit().map_err(wrap_err)?;
                }
                Ok(key)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, Operation::Write))??;

        tracing::trace!(key = %key, "Stored record");
        Ok(key)
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        let storage_key = storage_key(key)?;

        self.conn
            .call(move |conn| {
                conn.execute(schema::DELETE_ENTITY, [&storage_key])
                    .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, Operation::Write))
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        let after = match &query.cursor {
            Some(cursor) => cursor.decode_position()?,
            None => String::new(),
        };
        let namespace = query.namespace.clone().unwrap_or_default();
        let kind = query.kind.clone();
        let ancestor = match &query.ancestor {
            Some(ancestor) => Some((storage_key(ancestor)?, ancestor_prefix(ancestor)?)),
            None => None,
        };

        let rows: Vec<StoredRow> = self
            .conn
            .call(move |conn| {
                let rows = match &ancestor {
                    Some((ancestor_key, prefix)) => {
                        let mut stmt = conn
                            .prepare(schema::SELECT_ENTITIES_BY_ANCESTOR)
                            .map_err(wrap_err)?;
                        let rows = stmt
                            .query_map(
                                params![namespace, kind, after, ancestor_key, prefix],
                                read_row,
                            )
                            .map_err(wrap_err)?
                            .collect::<rusqlite::Result<Vec<_>>>();
                        rows
                    }
                    None => {
                        let mut stmt = conn
                            .prepare(schema::SELECT_ENTITIES_BY_KIND)
                            .map_err(wrap_err)?;
                        let rows = stmt
                            .query_map(params![namespace, kind, after], read_row)
                            .map_err(wrap_err)?
                            .collect::<rusqlite::Result<Vec<_>>>();
                        rows
                    }
                };
                rows.map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, Operation::Read))?;

        let candidates = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>>>()?;
        collect_page(candidates, query)
    }

    async fn allocate_ids(&self, incomplete: &Key, count: usize) -> Result<Vec<Key>> {
        if incomplete.is_complete() {
            return Err(StoreError::InvalidData(format!(
                "cannot allocate ids for complete key {incomplete}"
            )));
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let first = self.reserve_ids(incomplete, count).await?;
        tracing::debug!(kind = incomplete.kind(), count, first, "Allocated ids");
        (first..first + count as i64)
            .map(|id| incomplete.completed(id).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dsentity_core::store::{Cursor, Operator};
    use dsentity_core::{KeyId, PropertyMap, Value};

    async fn store() -> SqliteStore {
        SqliteStore::new_in_memory().await.unwrap()
    }

    fn user(id: i64, name: &str, active: bool) -> Record {
        Record::new(
            Key::with_id("User", id),
            PropertyMap::from([("name", Value::from(name)), ("active", Value::from(active))]),
        )
    }

    #[tokio::test]
    async fn test_put_and_get_preserves_types() {
        let store = store().await;
        let created_at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let record = Record::new(
            Key::with_id("User", 1),
            PropertyMap::from([
                ("name", Value::from("alice")),
                ("created_at", Value::from(created_at)),
                ("manager", Value::from(Key::with_id("User", 2))),
                ("score", Value::from(9.5)),
            ]),
        )
        .exclude_from_indexes(["score"]);

        let key = store.put(record.clone()).await.unwrap();
        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = store().await;
        assert!(store.get(&Key::with_id("User", 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_assigns_sequential_ids() {
        let store = store().await;
        let first = store
            .put(Record::new(Key::new("User"), PropertyMap::new()))
            .await
            .unwrap();
        let second = store
            .put(Record::new(Key::new("User"), PropertyMap::new()))
            .await
            .unwrap();
        let other_kind = store
            .put(Record::new(Key::new("Team"), PropertyMap::new()))
            .await
            .unwrap();

        assert_eq!(first.id(), Some(&KeyId::Id(1)));
        assert_eq!(second.id(), Some(&KeyId::Id(2)));
        assert_eq!(other_kind.id(), Some(&KeyId::Id(1)));
    }

    #[tokio::test]
    async fn test_auto_id_skips_explicit_ids() {
        let store = store().await;
        let explicit = store.put(user(1, "alice", true)).await.unwrap();
        let auto = store
            .put(Record::new(
                Key::new("User"),
                PropertyMap::from([("name", Value::from("bob"))]),
            ))
            .await
            .unwrap();

        assert_eq!(auto.id(), Some(&KeyId::Id(2)));
        let alice = store.get(&explicit).await.unwrap().unwrap();
        assert_eq!(alice.properties.get("name"), Some(&Value::from("alice")));

        // A lower explicit id leaves the sequence where it is.
        store.put(user(7, "carol", true)).await.unwrap();
        store.put(user(3, "dave", true)).await.unwrap();
        let keys = store.allocate_ids(&Key::new("User"), 2).await.unwrap();
        let ids: Vec<_> = keys.iter().filter_map(|k| k.id().and_then(KeyId::as_id)).collect();
        assert_eq!(ids, [8, 9]);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = store().await;
        store.put(user(1, "alice", true)).await.unwrap();
        store.put(user(1, "alicia", true)).await.unwrap();

        let fetched = store.get(&Key::with_id("User", 1)).await.unwrap().unwrap();
        assert_eq!(fetched.properties.get("name"), Some(&Value::from("alicia")));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        let key = store.put(user(1, "alice", true)).await.unwrap();
        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_with_filter_and_pages() {
        let store = store().await;
        for id in 1..=5 {
            store.put(user(id, "user", id % 2 == 1)).await.unwrap();
        }

        let query = Query::new("User")
            .filter("active", Operator::Equal, true)
            .limit(2);
        let first = store.query(&query).await.unwrap();
        assert_eq!(first.records.len(), 2);
        let cursor = first.next_cursor.clone().unwrap();

        let second = store
            .query(&query.clone().start_cursor(Some(cursor)))
            .await
            .unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].key, Key::with_id("User", 5));
        assert_eq!(second.next_cursor, None);
    }

    #[tokio::test]
    async fn test_query_rejects_bad_cursor() {
        let store = store().await;
        let query = Query::new("User").start_cursor(Some(Cursor::new("%%%")));
        assert!(matches!(
            store.query(&query).await,
            Err(StoreError::InvalidCursor(_))
        ));
    }

    #[tokio::test]
    async fn test_query_by_ancestor() {
        let store = store().await;
        let org = Key::with_id("Org", 1);
        let sibling = Key::with_id("Org", 10);
        store
            .put(Record::new(
                org.child("User", Some(KeyId::Id(1))).unwrap(),
                PropertyMap::new(),
            ))
            .await
            .unwrap();
        store
            .put(Record::new(
                sibling.child("User", Some(KeyId::Id(2))).unwrap(),
                PropertyMap::new(),
            ))
            .await
            .unwrap();

        let page = store
            .query(&Query::new("User").ancestor(org.clone()))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].key.parent(), Some(org));
    }

    #[tokio::test]
    async fn test_namespaced_handle() {
        let store = store().await;
        let scoped = store.with_namespace(Some("tests".to_string()));
        let key = scoped
            .put(Record::new(
                scoped.key(vec!["User".into()]).unwrap(),
                PropertyMap::new(),
            ))
            .await
            .unwrap();

        assert_eq!(key.namespace(), Some("tests"));
        assert!(store.query(&Query::new("User")).await.unwrap().records.is_empty());
        let page = store
            .query(&Query::new("User").in_namespace(Some("tests")))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn test_allocate_ids() {
        let store = store().await;
        let keys = store.allocate_ids(&Key::new("User"), 3).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[2].id(), Some(&KeyId::Id(3)));
        assert!(store.allocate_ids(&Key::new("User"), 0).await.unwrap().is_empty());
        assert!(matches!(
            store.allocate_ids(&Key::with_id("User", 1), 1).await,
            Err(StoreError::InvalidData(_))
        ));
    }
}
