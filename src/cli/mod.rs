//! CLI commands

mod classify;
mod info;
mod pull;
mod serve;

pub use classify::classify;
pub use info::info;
pub use pull::pull;
pub use serve::serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Petal - HTTP inference server for the iris classifier
#[derive(Parser)]
#[command(name = "petal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML or JSON config file
    #[arg(long, short, global = true, env = crate::config::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the inference server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Resolve the model before accepting requests
        #[arg(long)]
        preload: bool,
    },

    /// Classify one feature vector in-process
    Classify {
        /// Comma-separated features, e.g. 5.1,3.5,1.4,0.2
        #[arg(long, short, value_delimiter = ',', allow_hyphen_values = true)]
        features: Vec<f64>,
    },

    /// Download the model artifact
    Pull {
        /// Artifact URL (defaults to MODEL_URL)
        #[arg(long)]
        url: Option<String>,

        /// Destination file (defaults to the download cache path)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show model artifact information
    Info {
        /// Artifact path (defaults to the resolved model source)
        path: Option<PathBuf>,
    },
}
