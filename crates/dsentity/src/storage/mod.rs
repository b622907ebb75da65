//! Storage backend implementations.
//!
//! Concrete implementations of the `Datastore` trait defined in
//! `dsentity_core::store`. Backends are compiled in via feature flags and
//! picked at runtime through [`BackendConnector`].
//!
//! # Feature Flags
//!
//! - `inmemory` (default): process-local store, nothing persisted
//! - `sqlite` (default): SQLite backend using `rusqlite` and `tokio-rusqlite`
//! - `dynamodb`: AWS DynamoDB backend using `aws-sdk-dynamodb`
//!
//! # Examples
//!
//! Build with every backend:
//! ```bash
//! cargo build -p dsentity --features dynamodb
//! ```

mod connect;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

pub use connect::BackendConnector;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::{DynamoDbSettings, DynamoDbStore};
