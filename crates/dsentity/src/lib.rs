//! Store backends, configuration and the command line front end of
//! `dsentity`.
//!
//! The entity model itself lives in `dsentity_core`; this crate provides the
//! `Datastore` implementations and picks one at runtime from [`Config`].

pub mod cli;
pub mod config;
pub mod output;
pub mod storage;

pub use config::{BackendKind, Config, ConfigError};
pub use storage::BackendConnector;
