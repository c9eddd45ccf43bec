//! HTTP client for the model service.
//!
//! | Endpoint | Form field | Response |
//! |----------|-----------|----------|
//! | `POST {base}/analyzeImage` | `url` | `{"caption": "...", "embedding": [...]}` |
//! | `POST {base}/analyzeText` | `text` | `{"embedding": [...]}` |

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use thinkbank_core::defaults::{
    EMBED_DIMENSION, ENV_MODEL_SERVICE_TIMEOUT_SECS, ENV_MODEL_SERVICE_URL, MODEL_SERVICE_TIMEOUT_SECS,
    MODEL_SERVICE_URL,
};
use thinkbank_core::{Error, ImageAnalysis, InferenceBackend, Result};

#[derive(Deserialize)]
struct AnalyzeImageResponse {
    caption: String,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct AnalyzeTextResponse {
    embedding: Vec<f32>,
}

/// Model service client.
#[derive(Clone)]
pub struct HttpInferenceBackend {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    dimension: usize,
}

impl HttpInferenceBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(MODEL_SERVICE_TIMEOUT_SECS),
            dimension: EMBED_DIMENSION,
        }
    }

    /// Create from environment variables.
    ///
    /// - `MODEL_SERVICE_URL` (default `http://127.0.0.1:8000`)
    /// - `MODEL_SERVICE_TIMEOUT_SECS` (default 120)
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(ENV_MODEL_SERVICE_URL).unwrap_or_else(|_| MODEL_SERVICE_URL.to_string());
        let timeout_secs = std::env::var(ENV_MODEL_SERVICE_TIMEOUT_SECS)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MODEL_SERVICE_TIMEOUT_SECS);

        Self::new(base_url).with_timeout(Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Expected embedding length; responses of any other length are rejected.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service answers at all.
    pub async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(&self.base_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(!resp.status().is_server_error()),
            Err(_) => Ok(false),
        }
    }

    async fn post_form<T: DeserializeOwned>(&self, endpoint: &str, field: &str, value: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .form(&[(field, value)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("{} response read failed: {}", endpoint, e)))?;

        if !status.is_success() {
            warn!(
                subsystem = "inference",
                op = endpoint,
                status = status.as_u16(),
                "Model service returned non-success status"
            );
            return Err(Error::Upstream(format!("{} returned {}: {}", endpoint, status, body)));
        }

        debug!(
            subsystem = "inference",
            op = endpoint,
            duration_ms = start.elapsed().as_millis() as u64,
            "Model service call complete"
        );

        serde_json::from_str(&body)
            .map_err(|e| Error::Upstream(format!("{} returned malformed JSON: {}", endpoint, e)))
    }

    fn check_dimension(&self, endpoint: &str, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::Upstream(format!(
                "{} returned {}-dimensional embedding, expected {}",
                endpoint,
                embedding.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    #[instrument(skip(self), fields(subsystem = "inference", component = "http", op = "analyze_image"))]
    async fn analyze_image(&self, url: &str) -> Result<ImageAnalysis> {
        let resp: AnalyzeImageResponse = self.post_form("analyzeImage", "url", url).await?;
        self.check_dimension("analyzeImage", &resp.embedding)?;
        Ok(ImageAnalysis {
            caption: resp.caption,
            embedding: resp.embedding,
        })
    }

    #[instrument(skip(self, text), fields(subsystem = "inference", component = "http", op = "analyze_text"))]
    async fn analyze_text(&self, text: &str) -> Result<Vec<f32>> {
        let resp: AnalyzeTextResponse = self.post_form("analyzeText", "text", text).await?;
        self.check_dimension("analyzeText", &resp.embedding)?;
        Ok(resp.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = HttpInferenceBackend::new("http://model:8000/");
        assert_eq!(backend.base_url(), "http://model:8000");
    }

    #[test]
    fn test_builder() {
        let backend = HttpInferenceBackend::new("http://x")
            .with_timeout(Duration::from_secs(3))
            .with_dimension(4);
        assert_eq!(backend.timeout, Duration::from_secs(3));
        assert_eq!(InferenceBackend::dimension(&backend), 4);
    }

    #[test]
    fn test_dimension_check() {
        let backend = HttpInferenceBackend::new("http://x").with_dimension(2);
        assert!(backend.check_dimension("analyzeText", &[0.1, 0.2]).is_ok());
        assert!(matches!(
            backend.check_dimension("analyzeText", &[0.1]),
            Err(Error::Upstream(_))
        ));
    }
}
