//! Fakes shared by the entity tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::key::{storage_key, Key};
use crate::store::{
    collect_page, ConnectOptions, Connector, Datastore, Query, QueryPage, Record, Result,
    StoreError,
};

/// In-process store that records every call.
#[derive(Clone, Default)]
pub struct RecordingStore {
    namespace: Option<String>,
    records: Arc<Mutex<BTreeMap<String, Record>>>,
    puts: Arc<Mutex<Vec<Record>>>,
    queries: Arc<Mutex<Vec<Query>>>,
    deleted: Arc<Mutex<Vec<Key>>>,
    next_id: Arc<AtomicI64>,
    fail_puts: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(namespace: Option<String>) -> Self {
        Self {
            namespace,
            ..Self::default()
        }
    }

    pub fn failing_puts() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn puts(&self) -> Vec<Record> {
        self.puts.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<Key> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn insert(&self, record: Record) {
        let storage_key = storage_key(&record.key).unwrap();
        self.records.lock().unwrap().insert(storage_key, record);
    }

    fn complete(&self, key: &Key) -> Result<Key> {
        if key.is_complete() {
            return Ok(key.clone());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(key.completed(id)?)
    }
}

#[async_trait]
impl Datastore for RecordingStore {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    async fn get(&self, key: &Key) -> Result<Option<Record>> {
        let storage_key = storage_key(key)?;
        Ok(self.records.lock().unwrap().get(&storage_key).cloned())
    }

    async fn put(&self, record: Record) -> Result<Key> {
        self.puts.lock().unwrap().push(record.clone());
        if self.fail_puts {
            return Err(StoreError::WriteFailed("puts disabled".to_string()));
        }
        let key = self.complete(&record.key)?;
        self.insert(Record {
            key: key.clone(),
            ..record
        });
        Ok(key)
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        self.deleted.lock().unwrap().push(key.clone());
        let storage_key = storage_key(key)?;
        self.records.lock().unwrap().remove(&storage_key);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        self.queries.lock().unwrap().push(query.clone());
        let records = self.records.lock().unwrap().clone();
        collect_page(records, query)
    }

    async fn allocate_ids(&self, incomplete: &Key, count: usize) -> Result<Vec<Key>> {
        (0..count).map(|_| self.complete(incomplete)).collect()
    }
}

/// Connector that counts how often it is asked for a client.
#[derive(Default)]
pub struct CountingConnector {
    calls: AtomicUsize,
}

impl CountingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Datastore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingStore::with_namespace(
            options.namespace.clone(),
        )))
    }
}
