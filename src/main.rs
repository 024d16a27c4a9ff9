use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petal::cli::{Cli, Commands};
use petal::PetalConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petal=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PetalConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            preload,
        } => {
            petal::cli::serve(config, port, host, preload).await?;
        }
        Commands::Classify { features } => {
            petal::cli::classify(config, features).await?;
        }
        Commands::Pull { url, output } => {
            petal::cli::pull(config, url, output).await?;
        }
        Commands::Info { path } => {
            petal::cli::info(config, path).await?;
        }
    }

    Ok(())
}
