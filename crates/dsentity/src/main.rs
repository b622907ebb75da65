use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dsentity::cli::{self, Cli};
use dsentity::{BackendConnector, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber, writing to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dsentity=info,dsentity_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.global.apply(Config::from_env());
    tracing::debug!(backend = %config.backend, namespace = ?config.namespace, "Loaded configuration");

    let connector = BackendConnector::new(config);
    let output = cli::run(cli, &connector).await?;
    println!("{output}");

    Ok(())
}
