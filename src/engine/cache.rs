//! Single-slot artifact cache
//!
//! Holds the classifier for the lifetime of the server. There is no
//! eviction and no reload: once an artifact is stored it is served until
//! the process exits. Concurrent cold starts may both load and store; the
//! last write wins and both values are equivalent.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::model::Classifier;

/// Where a cached artifact came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// Bundled file found among the local candidates
    Local(PathBuf),
    /// Downloaded from a remote URL into `path`
    Remote { url: String, path: PathBuf },
}

impl fmt::Display for ArtifactOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactOrigin::Local(path) => write!(f, "{}", path.display()),
            ArtifactOrigin::Remote { url, path } => write!(f, "{} (via {})", url, path.display()),
        }
    }
}

/// Cache entry
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub model: Arc<dyn Classifier>,
    pub origin: ArtifactOrigin,
    pub loaded_at: Instant,
}

impl CachedArtifact {
    /// Time since the artifact was loaded
    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }
}

/// Process-lifetime artifact slot
#[derive(Debug, Default)]
pub struct ArtifactCache {
    slot: RwLock<Option<CachedArtifact>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry, if any
    pub async fn get(&self) -> Option<CachedArtifact> {
        self.slot.read().await.clone()
    }

    /// Replace the entry
    pub async fn store(&self, entry: CachedArtifact) {
        let mut slot = self.slot.write().await;
        if let Some(previous) = slot.as_ref() {
            tracing::debug!(
                "Replacing cached artifact from {} (loaded {:.1}s ago)",
                previous.origin,
                previous.age().as_secs_f64()
            );
        }
        *slot = Some(entry);
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.read().await.is_some()
    }
}
