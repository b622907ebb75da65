//! In-memory storage backend.
//!
//! Stores records in a `BTreeMap` keyed by storage key, wrapped in
//! `Arc<RwLock<_>>`. Useful for tests and short-lived tools where
//! persistence is not required.
//!
//! # Example
//!
//! ```rust,ignore
//! use dsentity::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! let scoped = store.with_namespace(Some("tests".to_string()));
//! ```

mod store;

pub use store::InMemoryStore;
