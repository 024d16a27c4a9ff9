//! Inference pipeline
//!
//! - ArtifactCache: single-slot, process-lifetime model cache
//! - ArtifactResolver: finds, downloads and loads the artifact
//! - LazyBackend: runtime dependencies built on first use
//! - InferenceHandler: request validation, prediction and error mapping

mod backend;
mod cache;
mod fetch;
mod handler;
mod resolver;

pub use backend::{Backend, BackendProvider, HttpBackendProvider, LazyBackend};
pub use cache::{ArtifactCache, ArtifactOrigin, CachedArtifact};
pub use fetch::{write_atomically, Fetcher, HttpFetcher};
pub use handler::{
    coerce_features, decode_request, InferenceHandler, InferenceRequest, InferenceResponse, Reply,
};
pub use resolver::{ArtifactResolver, ArtifactSource};

use std::sync::Arc;

use crate::config::PetalConfig;
use crate::model::LabelSet;

/// Wire up a handler with the default resolver and backend for `config`
pub fn build_handler(config: &PetalConfig, cache: Arc<ArtifactCache>) -> InferenceHandler {
    let labels = LabelSet::new(config.labels.iter().cloned());
    let resolver = ArtifactResolver::new(config.artifact.clone(), labels.clone(), cache);
    let provider = HttpBackendProvider::new(config.artifact.download_timeout());
    InferenceHandler::new(Arc::new(resolver), Arc::new(provider), labels)
}
