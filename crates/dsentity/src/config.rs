use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown backend '{0}', expected one of: memory, sqlite, dynamodb")]
    UnknownBackend(String),
}

/// Store backend selected at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    #[default]
    Sqlite,
    DynamoDb,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Sqlite => "sqlite",
            BackendKind::DynamoDb => "dynamodb",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "inmemory" => Ok(BackendKind::Memory),
            "sqlite" => Ok(BackendKind::Sqlite),
            "dynamodb" => Ok(BackendKind::DynamoDb),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend to connect to (default: sqlite)
    pub backend: BackendKind,
    /// Namespace for keys and queries (default: none)
    pub namespace: Option<String>,
    /// Path to SQLite database file (default: "dsentity.db")
    pub sqlite_path: String,
    /// DynamoDB table name (default: "dsentity")
    pub dynamodb_table: String,
    /// Custom endpoint URL, e.g. a local DynamoDB
    pub aws_endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub aws_region: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DSENTITY_BACKEND` - `memory`, `sqlite` or `dynamodb` (default: sqlite)
    /// - `DSENTITY_NAMESPACE` - Namespace (default: none)
    /// - `SQLITE_PATH` - SQLite database path (default: "dsentity.db")
    /// - `DYNAMODB_TABLE_NAME` - DynamoDB table (default: "dsentity")
    /// - `AWS_ENDPOINT_URL` - Custom AWS endpoint (default: none)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    pub fn from_env() -> Self {
        Self {
            backend: env::var("DSENTITY_BACKEND")
                .ok()
                .map(|v| parse_backend(&v))
                .unwrap_or_default(),
            namespace: env::var("DSENTITY_NAMESPACE").ok().filter(|ns| !ns.is_empty()),
            sqlite_path: env::var("SQLITE_PATH").unwrap_or_else(|_| "dsentity.db".to_string()),
            dynamodb_table: env::var("DYNAMODB_TABLE_NAME")
                .unwrap_or_else(|_| "dsentity".to_string()),
            aws_endpoint_url: env::var("AWS_ENDPOINT_URL").ok(),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            namespace: None,
            sqlite_path: "dsentity.db".to_string(),
            dynamodb_table: "dsentity".to_string(),
            aws_endpoint_url: None,
            aws_region: "us-east-1".to_string(),
        }
    }
}

/// Parses a backend name, falling back to the default on unknown names.
fn parse_backend(value: &str) -> BackendKind {
    value.parse().unwrap_or_else(|err: ConfigError| {
        tracing::warn!(error = %err, "Falling back to default backend");
        BackendKind::default()
    })
}
