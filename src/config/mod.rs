//! Configuration system for petal
//!
//! A single [`PetalConfig`] covers the HTTP server, the artifact source and
//! the label ordering. It loads from YAML or JSON, and `MODEL_URL` in the
//! environment overrides the artifact URL.

mod artifact;
mod server;

pub use artifact::{ArtifactConfig, CACHE_FILE_NAME, MODEL_URL_ENV};
pub use server::ServerConfig;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "PETAL_CONFIG";

/// Class names in the order the bundled artifact was trained with
pub const DEFAULT_LABELS: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Petal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetalConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Artifact source settings
    #[serde(default)]
    pub artifact: ArtifactConfig,

    /// Label for each class index, in index order
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|s| s.to_string()).collect()
}

impl Default for PetalConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            artifact: ArtifactConfig::default(),
            labels: default_labels(),
        }
    }
}

impl PetalConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from a file, picking the parser by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            _ => Self::from_yaml(path),
        };
        config.with_context(|| format!("reading config {}", path.display()))
    }

    /// Resolve the effective configuration for this process
    ///
    /// Reads `path` when given, otherwise starts from defaults. The CLI fills
    /// `path` from `--config` or `PETAL_CONFIG`. Environment overrides are
    /// applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay process environment variables
    pub fn apply_env(&mut self) {
        self.artifact.apply_env_with(|key| std::env::var(key).ok());
    }
}
