//! Runtime backend selection.

use std::sync::Arc;

use async_trait::async_trait;

use dsentity_core::store::{ConnectOptions, Connector, Datastore, Result, StoreError};

use crate::config::{BackendKind, Config};

#[cfg(feature = "inmemory")]
use super::inmemory::InMemoryStore;
#[cfg(feature = "sqlite")]
use super::sqlite::SqliteStore;

/// Connects entities to the backend named by a [`Config`].
///
/// Connections made through one connector share data: the in-memory store
/// and the SQLite connection are created once and scoped per namespace.
pub struct BackendConnector {
    config: Config,
    #[cfg(feature = "inmemory")]
    memory: InMemoryStore,
    #[cfg(feature = "sqlite")]
    sqlite: tokio::sync::OnceCell<SqliteStore>,
}

impl BackendConnector {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            #[cfg(feature = "inmemory")]
            memory: InMemoryStore::new(),
            #[cfg(feature = "sqlite")]
            sqlite: tokio::sync::OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Namespace from the options, else the configured one.
    fn namespace(&self, options: &ConnectOptions) -> Option<String> {
        options
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .or_else(|| self.config.namespace.clone())
    }

    #[cfg(feature = "inmemory")]
    fn connect_memory(&self, namespace: Option<String>) -> Result<Arc<dyn Datastore>> {
        Ok(Arc::new(self.memory.with_namespace(namespace)))
    }

    #[cfg(not(feature = "inmemory"))]
    fn connect_memory(&self, _namespace: Option<String>) -> Result<Arc<dyn Datastore>> {
        Err(not_compiled(BackendKind::Memory, "inmemory"))
    }

    #[cfg(feature = "sqlite")]
    async fn connect_sqlite(&self, namespace: Option<String>) -> Result<Arc<dyn Datastore>> {
        let store = self
            .sqlite
            .get_or_try_init(|| SqliteStore::new(&self.config.sqlite_path))
            .await?;
        Ok(Arc::new(store.with_namespace(namespace)))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn connect_sqlite(&self, _namespace: Option<String>) -> Result<Arc<dyn Datastore>> {
        Err(not_compiled(BackendKind::Sqlite, "sqlite"))
    }

    #[cfg(feature = "dynamodb")]
    async fn connect_dynamodb(
        &self,
        namespace: Option<String>,
        profile: Option<String>,
    ) -> Result<Arc<dyn Datastore>> {
        use super::dynamodb::{DynamoDbSettings, DynamoDbStore};

        let store = DynamoDbStore::connect(DynamoDbSettings {
            table_name: self.config.dynamodb_table.clone(),
            region: self.config.aws_region.clone(),
            endpoint_url: self.config.aws_endpoint_url.clone(),
            profile,
        })
        .await?;
        Ok(Arc::new(store.with_namespace(namespace)))
    }

    #[cfg(not(feature = "dynamodb"))]
    async fn connect_dynamodb(
        &self,
        _namespace: Option<String>,
        _profile: Option<String>,
    ) -> Result<Arc<dyn Datastore>> {
        Err(not_compiled(BackendKind::DynamoDb, "dynamodb"))
    }
}

#[async_trait]
impl Connector for BackendConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Datastore>> {
        let namespace = self.namespace(options);
        tracing::debug!(backend = %self.config.backend, namespace = ?namespace, "Connecting");

        match self.config.backend {
            BackendKind::Memory => self.connect_memory(namespace),
            BackendKind::Sqlite => self.connect_sqlite(namespace).await,
            BackendKind::DynamoDb => {
                self.connect_dynamodb(namespace, options.credentials_profile.clone())
                    .await
            }
        }
    }
}

#[cfg(not(all(feature = "inmemory", feature = "sqlite", feature = "dynamodb")))]
fn not_compiled(backend: BackendKind, feature: &str) -> StoreError {
    StoreError::ConnectionFailed(format!(
        "backend '{backend}' is not compiled in, rebuild with the '{feature}' feature"
    ))
}
