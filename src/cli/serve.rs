//! HTTP server command

use std::sync::Arc;

use anyhow::Result;

use crate::config::PetalConfig;
use crate::engine::{build_handler, ArtifactCache};
use crate::model::Classifier;
use crate::server::{self, AppState};

/// Start the inference server
pub async fn serve(
    mut config: PetalConfig,
    port: Option<u16>,
    host: Option<String>,
    preload: bool,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    match config.artifact.remote_url() {
        Some(url) => tracing::info!("Model source: {}", url),
        None => tracing::info!(
            "Model source: first of {}",
            config
                .artifact
                .candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }

    let cache = Arc::new(ArtifactCache::new());
    let handler = Arc::new(build_handler(&config, cache));

    // A failed preload is not fatal; requests report the error themselves.
    if preload {
        tracing::info!("Pre-loading model");
        match handler.warm_up().await {
            Ok(model) => tracing::info!("Model loaded: {}", model.describe()),
            Err(e) => tracing::warn!("Model preload failed: {}", e),
        }
    }

    let state = Arc::new(AppState::new(handler));
    server::start(state, config.server).await
}
