//! Remote artifact download

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

/// Downloads a URL to a local file
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` into `dest`, returning the number of bytes written
    ///
    /// `dest` must either be left untouched or contain the complete body.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTP(S) fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("petal/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("server returned an error status")?;

        let bytes = response
            .bytes()
            .await
            .context("failed to read response body")?;

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomically(&dest, &bytes))
            .await
            .map_err(|e| anyhow!("write task failed: {}", e))?
    }
}

/// Write through a sibling temp file and rename into place
///
/// Readers never observe a partially written artifact at `dest`.
pub fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<u64> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("writing artifact")?;
    tmp.flush().context("flushing artifact")?;
    tmp.persist(dest)
        .map_err(|e| anyhow!("moving artifact into {}: {}", dest.display(), e.error))?;

    Ok(bytes.len() as u64)
}
