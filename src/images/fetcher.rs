//! Network fetch of raw image bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::LoadError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of raw image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download the bytes behind `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, LoadError>;
}

/// Fetches images over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Request(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, LoadError> {
        debug!("Downloading image: {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LoadError::Status(response.status().as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| LoadError::Request(format!("Failed to read body: {e}")))
    }
}
