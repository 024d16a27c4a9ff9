//! Download the model artifact

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::config::PetalConfig;
use crate::engine::{Fetcher, HttpFetcher};
use crate::loader;

/// Download an artifact and verify that it loads
pub async fn pull(config: PetalConfig, url: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let url = url
        .or_else(|| config.artifact.remote_url().map(str::to_string))
        .ok_or_else(|| anyhow!("no URL given; pass --url or set MODEL_URL"))?;
    let dest = output.unwrap_or_else(|| config.artifact.cache_path.clone());

    println!("Downloading from: {}", url);

    let fetcher = HttpFetcher::new(config.artifact.download_timeout())?;
    let bytes = fetcher.fetch(&url, &dest).await?;

    let info = loader::get_artifact_info(&dest)?;
    println!(
        "Downloaded {} bytes to: {} ({} trees, {} features, {} classes)",
        bytes,
        dest.display(),
        info.n_trees,
        info.n_features,
        info.n_classes
    );

    Ok(())
}
