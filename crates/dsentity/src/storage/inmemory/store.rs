//! In-memory store implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dsentity_core::key::{namespace_prefix, storage_key, Key, KeyId};
use dsentity_core::store::{
    collect_page, Datastore, Query, QueryPage, Record, Result, StoreError,
};

type SequenceKey = (Option<String>, String);

/// In-memory storage backend.
///
/// Clones and [`InMemoryStore::with_namespace`] handles share the same data.
/// Data is not persisted and is lost when the last handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    namespace: Option<String>,
    records: Arc<RwLock<BTreeMap<String, Record>>>,
    sequences: Arc<RwLock<HashMap<SequenceKey, i64>>>,
}

impl InMemoryStore {
    /// Creates a new empty store in the default namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle on the same data scoped to another namespace.
    pub fn with_namespace(&self, namespace: Option<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            records: Arc::clone(&self.records),
            sequences: Arc::clone(&self.sequences),
        }
    }

    /// Number of stored records across all namespaces.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Reserves the next `count` ids for the key's namespace and kind.
    async fn next_ids(&self, key: &Key, count: usize) -> Vec<i64> {
        let mut sequences = self.sequences.write().await;
        let counter = sequences.entry(sequence_key(key)).or_insert(0);
        let first = *counter + 1;
        *counter += count as i64;
        (first..first + count as i64).collect()
    }
}

fn sequence_key(key: &Key) -> SequenceKey {
    (key.namespace().map(str::to_string), key.kind().to_string())
}

#[async_trait]
impl Datastore for InMemoryStore {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    async fn get(&self, key: &Key) -> Result<Option<Record>> {
        let storage_key = storage_key(key)?;
        let records = self.records.read().await;
        Ok(records.get(&storage_key).cloned())
    }

    async fn put(&self, record: Record) -> Result<Key> {
        // Both locks are held so an explicit id and an auto id never collide.
        let mut sequences = self.sequences.write().await;
        let counter = sequences.entry(sequence_key(&record.key)).or_insert(0);
        let key = match record.key.id() {
            Some(KeyId::Id(id)) => {
                *counter = (*counter).max(*id);
                record.key.clone()
            }
            Some(KeyId::Name(_)) => record.key.clone(),
            None => {
                *counter += 1;
                record.key.completed(*counter)?
            }
        };
        let storage_key = storage_key(&key)?;

        let mut records = self.records.write().await;
        drop(sequences);
        records.insert(
            storage_key,
            Record {
                key: key.clone(),
                ..record
            },
        );
        Ok(key)
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        let storage_key = storage_key(key)?;
        let mut records = self.records.write().await;
        records.remove(&storage_key);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        let prefix = match &query.ancestor {
            Some(ancestor) => storage_key(ancestor)?,
            None => namespace_prefix(query.namespace.as_deref()),
        };

        let records = self.records.read().await;
        let candidates = records
            .range(prefix.clone()..)
            .take_while(|(storage_key, _)| storage_key.starts_with(&prefix))
            .map(|(storage_key, record)| (storage_key.clone(), record.clone()));
        collect_page(candidates, query)
    }

    async fn allocate_ids(&self, incomplete: &Key, count: usize) -> Result<Vec<Key>> {
        if incomplete.is_complete() {
            return Err(StoreError::InvalidData(format!(
                "cannot allocate ids for complete key {incomplete}"
            )));
        }
        let ids = self.next_ids(incomplete, count).await;
        tracing::debug!(kind = incomplete.kind(), count, "Allocated ids");
        ids.into_iter()
            .map(|id| incomplete.completed(id).map_err(StoreError::from))
            .collect()
    }
}
