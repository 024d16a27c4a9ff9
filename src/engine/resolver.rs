//! Artifact resolution
//!
//! Finds the classifier artifact and loads it into the shared cache:
//! - cache hit: returned without touching the filesystem
//! - `MODEL_URL` set: downloaded once to a fixed temp path, then loaded
//! - otherwise: first existing local candidate is loaded

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use async_trait::async_trait;

use super::backend::Backend;
use super::cache::{ArtifactCache, ArtifactOrigin, CachedArtifact};
use crate::config::ArtifactConfig;
use crate::error::{ServeError, ServeResult};
use crate::loader;
use crate::model::{Classifier, LabelSet};

/// Something the inference handler can get a classifier from
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Classifier already in memory, if any. Never does I/O.
    async fn cached(&self) -> Option<Arc<dyn Classifier>>;

    /// Cheap check that some artifact source is reachable
    fn preflight(&self) -> ServeResult<()>;

    /// Locate, load and cache the classifier
    async fn resolve(&self, backend: &Backend) -> ServeResult<Arc<dyn Classifier>>;
}

/// Resolves the artifact from the configured URL or local candidates
pub struct ArtifactResolver {
    config: ArtifactConfig,
    labels: LabelSet,
    cache: Arc<ArtifactCache>,
}

impl ArtifactResolver {
    pub fn new(config: ArtifactConfig, labels: LabelSet, cache: Arc<ArtifactCache>) -> Self {
        Self {
            config,
            labels,
            cache,
        }
    }

    pub fn config(&self) -> &ArtifactConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// First local candidate that exists
    pub fn find_local(&self) -> Option<PathBuf> {
        self.config
            .candidates
            .iter()
            .find(|candidate| candidate.exists())
            .cloned()
    }

    /// First local candidate that exists, or the not-found error naming
    /// every probed path
    pub fn local_source(&self) -> ServeResult<PathBuf> {
        self.find_local()
            .ok_or_else(|| ServeError::ArtifactNotFound {
                candidates: self.config.candidates.clone(),
            })
    }

    /// Make sure the remote artifact is on disk, downloading if needed
    async fn ensure_downloaded(&self, backend: &Backend, url: &str) -> ServeResult<PathBuf> {
        let path = self.config.cache_path.clone();

        if path.exists() {
            tracing::debug!("Reusing downloaded artifact at {}", path.display());
            return Ok(path);
        }

        tracing::info!("Downloading model from {} to {}", url, path.display());
        let started = Instant::now();
        let bytes = backend
            .fetcher()
            .fetch(url, &path)
            .await
            .map_err(|cause| ServeError::ArtifactDownload {
                url: url.to_string(),
                cause,
            })?;
        tracing::info!(
            "Downloaded {} bytes in {:.2}s",
            bytes,
            started.elapsed().as_secs_f64()
        );

        Ok(path)
    }

    /// Deserialize the artifact and check it against the label set
    async fn load(&self, path: &Path) -> ServeResult<Arc<dyn Classifier>> {
        let owned = path.to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || loader::load_artifact(&owned))
            .await
            .map_err(|e| anyhow!("load task failed: {}", e))
            .and_then(|result| result);

        let model = loaded.and_then(|model| {
            self.labels.check_compatible(model.as_ref())?;
            Ok(model)
        });

        model.map_err(|cause| ServeError::ArtifactLoad {
            path: path.to_path_buf(),
            cause,
        })
    }
}

#[async_trait]
impl ArtifactSource for ArtifactResolver {
    async fn cached(&self) -> Option<Arc<dyn Classifier>> {
        self.cache.get().await.map(|entry| entry.model)
    }

    fn preflight(&self) -> ServeResult<()> {
        if self.config.remote_url().is_some() {
            return Ok(());
        }
        self.local_source().map(|_| ())
    }

    async fn resolve(&self, backend: &Backend) -> ServeResult<Arc<dyn Classifier>> {
        if let Some(entry) = self.cache.get().await {
            tracing::debug!(
                "Using cached artifact from {} (loaded {:.1}s ago)",
                entry.origin,
                entry.age().as_secs_f64()
            );
            return Ok(entry.model);
        }

        let (origin, path) = match self.config.remote_url() {
            Some(url) => {
                let path = self.ensure_downloaded(backend, url).await?;
                let origin = ArtifactOrigin::Remote {
                    url: url.to_string(),
                    path: path.clone(),
                };
                (origin, path)
            }
            None => {
                let path = self.local_source()?;
                (ArtifactOrigin::Local(path.clone()), path)
            }
        };

        let model = match self.load(&path).await {
            Ok(model) => model,
            Err(err) => {
                // A corrupt download would otherwise be reused forever.
                if matches!(origin, ArtifactOrigin::Remote { .. }) {
                    if let Err(e) = std::fs::remove_file(&path) {
                        tracing::warn!("Could not remove bad artifact {}: {}", path.display(), e);
                    }
                }
                return Err(err);
            }
        };

        tracing::info!("Loaded {} from {}", model.describe(), origin);
        self.cache
            .store(CachedArtifact {
                model: Arc::clone(&model),
                origin,
                loaded_at: Instant::now(),
            })
            .await;

        Ok(model)
    }
}
