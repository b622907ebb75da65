use std::sync::Arc;

use async_trait::async_trait;

use crate::key::{Key, KeyError, PathPart};

use super::{ConnectOptions, Query, QueryPage, Record, Result};

/// Client of a key/value entity store.
///
/// Implementations are cheap to share (`Arc<dyn Datastore>`) and scoped to a
/// single namespace.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Namespace keys built by this client belong to.
    fn namespace(&self) -> Option<&str>;

    /// Builds a key from alternating kind/id segments in this client's
    /// namespace. A trailing kind yields an incomplete key.
    fn key(&self, path: Vec<PathPart>) -> std::result::Result<Key, KeyError> {
        Ok(Key::from_path(path)?.in_namespace(self.namespace().map(str::to_string)))
    }

    /// Gets a record by key.
    async fn get(&self, key: &Key) -> Result<Option<Record>>;

    /// Writes a record, replacing any existing one. Incomplete keys are
    /// completed with a fresh id; the stored key is returned.
    async fn put(&self, record: Record) -> Result<Key>;

    /// Deletes a record. Deleting a missing key is not an error.
    async fn delete(&self, key: &Key) -> Result<()>;

    /// Runs a query and returns one page of results.
    async fn query(&self, query: &Query) -> Result<QueryPage>;

    /// Reserves `count` ids for an incomplete key, returning completed keys.
    async fn allocate_ids(&self, incomplete: &Key, count: usize) -> Result<Vec<Key>>;
}

/// Establishes store clients.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Datastore>>;
}
