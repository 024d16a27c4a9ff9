//! Artifact source settings

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the remote artifact URL
pub const MODEL_URL_ENV: &str = "MODEL_URL";

/// Well-known file name of the downloaded artifact inside the temp dir
pub const CACHE_FILE_NAME: &str = "petal-model.json";

/// Where the classifier artifact comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Remote artifact URL. When set, local candidates are ignored.
    #[serde(default)]
    pub model_url: Option<String>,

    /// Local paths probed in order when no URL is configured
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,

    /// Download destination for the remote artifact
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Upper bound on a single download, in seconds (0 = no limit)
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_candidates() -> Vec<PathBuf> {
    vec![PathBuf::from("app/model.json"), PathBuf::from("model.json")]
}

fn default_cache_path() -> PathBuf {
    std::env::temp_dir().join(CACHE_FILE_NAME)
}

fn default_download_timeout() -> u64 {
    60
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_url: None,
            candidates: default_candidates(),
            cache_path: default_cache_path(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl ArtifactConfig {
    /// Remote URL, treating an empty string as unset
    pub fn remote_url(&self) -> Option<&str> {
        self.model_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Download timeout, `None` when disabled
    pub fn download_timeout(&self) -> Option<Duration> {
        match self.download_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Overlay environment variables using the given lookup
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(MODEL_URL_ENV) {
            self.model_url = if url.trim().is_empty() {
                None
            } else {
                Some(url)
            };
        }
    }
}
