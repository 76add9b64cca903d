//! Downloading release assets.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{GateError, Result};

/// Default timeout for release downloads.
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Source of release archives.
///
/// The installer only needs the raw bytes of one URL; tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Fetches `url` and returns the response body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches release assets over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default download timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::download(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ReleaseFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GateError::download(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::download(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GateError::download(format!("Failed to read response body: {}", e)))?;

        Ok(body.to_vec())
    }
}
