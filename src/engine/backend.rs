//! Lazily initialized inference backend
//!
//! The backend bundles the runtime pieces a prediction needs beyond the
//! artifact itself. It is built on first use, after the request has passed
//! the cheap validation steps, so a broken runtime only fails the requests
//! that actually need it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::OnceCell;

use super::fetch::{Fetcher, HttpFetcher};

/// Runtime dependencies of the prediction path
#[derive(Clone)]
pub struct Backend {
    fetcher: Arc<dyn Fetcher>,
}

impl Backend {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }
}

/// Builds a [`Backend`]
pub trait BackendProvider: Send + Sync {
    fn init(&self) -> Result<Backend>;
}

/// Default provider: reqwest-backed downloads with an optional timeout
#[derive(Debug, Clone, Default)]
pub struct HttpBackendProvider {
    download_timeout: Option<Duration>,
}

impl HttpBackendProvider {
    pub fn new(download_timeout: Option<Duration>) -> Self {
        Self { download_timeout }
    }
}

impl BackendProvider for HttpBackendProvider {
    fn init(&self) -> Result<Backend> {
        let fetcher = HttpFetcher::new(self.download_timeout)?;
        Ok(Backend::new(Arc::new(fetcher)))
    }
}

/// A backend built at most once, on first successful use
///
/// Failed initializations are not remembered; the next request retries.
pub struct LazyBackend {
    provider: Arc<dyn BackendProvider>,
    cell: OnceCell<Backend>,
}

impl LazyBackend {
    pub fn new(provider: Arc<dyn BackendProvider>) -> Self {
        Self {
            provider,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<&Backend> {
        self.cell
            .get_or_try_init(|| async {
                let backend = self.provider.init()?;
                tracing::info!("Inference backend initialized");
                Ok::<_, anyhow::Error>(backend)
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
