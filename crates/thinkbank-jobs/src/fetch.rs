//! Retrieve source bytes for a stored asset.
//!
//! Stored locations are either HTTP(S) URLs (when storage is exposed through
//! a public URL) or filesystem paths.

use std::time::Duration;

use tracing::debug;

use thinkbank_core::{Error, Result};

const FETCH_TIMEOUT_SECS: u64 = 60;

/// Reads asset bytes from a URL or local path.
#[derive(Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let response = self.client.get(location).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Transport(format!(
                    "GET {} returned {}",
                    location, status
                )));
            }
            let bytes = response.bytes().await?;
            debug!(location, bytes = bytes.len(), "Fetched remote source");
            return Ok(bytes.to_vec());
        }

        let path = location.strip_prefix("file://").unwrap_or(location);
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("source not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();

        let fetcher = SourceFetcher::new();
        let bytes = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"abc");

        let url = format!("file://{}", path.display());
        assert_eq!(fetcher.fetch(&url).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let err = SourceFetcher::new()
            .fetch("/definitely/not/here.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
