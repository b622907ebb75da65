//! Command line interface of the `dsentity` binary.

mod commands;

pub use commands::run;

use clap::{Parser, Subcommand};
use dsentity_core::{PathPart, Value};

use crate::config::{BackendKind, Config};
use crate::output::OutputFormat;

/// Inspect and edit entities stored in a key/value datastore
#[derive(Debug, Parser)]
#[command(name = "dsentity")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: Global,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Namespace for keys and queries
    #[arg(long, global = true, env = "DSENTITY_NAMESPACE")]
    pub namespace: Option<String>,

    /// Store backend: memory, sqlite or dynamodb
    #[arg(long, global = true, env = "DSENTITY_BACKEND")]
    pub backend: Option<BackendKind>,

    /// AWS credentials profile (dynamodb backend)
    #[arg(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,
}

impl Global {
    /// Apply the command line overrides to a configuration.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(namespace) = self.namespace.clone().filter(|ns| !ns.is_empty()) {
            config.namespace = Some(namespace);
        }
        config
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the entity stored under a key
    Get {
        /// Key path, e.g. `Org 1 User alice`
        #[arg(required = true, num_args = 1..)]
        path: Vec<String>,
    },

    /// Write an entity
    Put {
        /// Entity kind
        #[arg(long)]
        kind: String,

        /// Id or name of the new entity (assigned by the store when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Parent key path, `/` separated, e.g. `Org/1`
        #[arg(long, value_delimiter = '/')]
        parent: Vec<String>,

        /// Properties as a JSON object
        #[arg(long)]
        props: String,

        /// Property to leave out of the write
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// List entities whose property satisfies a comparison
    Find {
        #[arg(long)]
        kind: String,

        #[arg(long)]
        property: String,

        /// Comparison operator: =, !=, <, <=, >, >=
        #[arg(long, default_value = "=")]
        op: String,

        /// Operand, as JSON (bare words are strings)
        #[arg(long)]
        value: String,

        #[arg(long, default_value_t = dsentity_core::store::MAX_QUERY_LIMIT)]
        limit: usize,
    },

    /// Page through entities whose property equals a value
    Page {
        #[arg(long)]
        kind: String,

        #[arg(long)]
        property: String,

        /// Operand, as JSON (bare words are strings)
        #[arg(long)]
        value: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Cursor printed by the previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// List active entities of a kind below an ancestor
    Children {
        #[arg(long)]
        kind: String,

        #[arg(long, default_value_t = dsentity_core::store::MAX_QUERY_LIMIT)]
        limit: usize,

        /// Ancestor key path
        #[arg(required = true, num_args = 1..)]
        ancestor: Vec<String>,
    },

    /// Delete the entity stored under a key
    Delete {
        #[arg(required = true, num_args = 1..)]
        path: Vec<String>,
    },

    /// Reserve ids for an incomplete key, e.g. `Org 1 User`
    AllocateIds {
        #[arg(long, default_value_t = 1)]
        count: usize,

        #[arg(required = true, num_args = 1..)]
        path: Vec<String>,
    },
}

/// Parse key path segments; positive integers are ids.
pub fn parse_path(segments: &[String]) -> Vec<PathPart> {
    segments.iter().map(|s| PathPart::parse(s)).collect()
}

/// Parse an operand given on the command line.
///
/// Valid JSON is converted as such; anything else is taken as a string.
pub fn parse_value(input: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(input)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(input.to_string()))
}
