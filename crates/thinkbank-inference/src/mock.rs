//! Mock inference backend for deterministic testing.
//!
//! Captions are derived from the file name in the requested URL and
//! embeddings from the input text, so the same input always yields the same
//! output and text/image pairs about the same subject land close together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use thinkbank_inference::mock::MockInferenceBackend;
//!
//! let backend = MockInferenceBackend::new().with_caption("a cat on a sofa");
//! let analysis = backend.analyze_image("http://host/1.jpg").await.unwrap();
//! assert_eq!(analysis.embedding.len(), 512);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use thinkbank_core::defaults::EMBED_DIMENSION;
use thinkbank_core::{Error, ImageAnalysis, InferenceBackend, Result};

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    caption: Option<String>,
    latency: Duration,
    fail_images: bool,
    fail_text: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: EMBED_DIMENSION,
            caption: None,
            latency: Duration::ZERO,
            fail_images: false,
            fail_text: false,
        }
    }
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: &'static str,
    pub input: String,
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Return this caption for every image instead of one derived from the URL.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).caption = Some(caption.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        Arc::make_mut(&mut self.config).latency = latency;
        self
    }

    /// Make every `analyze_image` call fail with an upstream error.
    pub fn failing_images(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_images = true;
        self
    }

    /// Make every `analyze_text` call fail with an upstream error.
    pub fn failing_text(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_text = true;
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.log().clone()
    }

    pub fn image_call_count(&self) -> usize {
        self.log()
            .iter()
            .filter(|c| c.operation == "analyze_image")
            .count()
    }

    pub fn text_call_count(&self) -> usize {
        self.log()
            .iter()
            .filter(|c| c.operation == "analyze_text")
            .count()
    }

    fn log(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.call_log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, operation: &'static str, input: &str) {
        self.log().push(MockCall {
            operation,
            input: input.to_string(),
        });
    }

    async fn simulate_latency(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }

    /// Caption derived from the last path segment of `url`.
    pub fn caption_for(url: &str) -> String {
        let name = url.rsplit('/').next().unwrap_or(url);
        format!("mock caption for {}", name)
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn analyze_image(&self, url: &str) -> Result<ImageAnalysis> {
        self.record("analyze_image", url);
        self.simulate_latency().await;
        if self.config.fail_images {
            return Err(Error::Upstream("mock analyzeImage failure".to_string()));
        }

        let caption = self
            .config
            .caption
            .clone()
            .unwrap_or_else(|| Self::caption_for(url));
        let embedding = MockEmbeddingGenerator::generate(&caption, self.config.dimension);
        Ok(ImageAnalysis { caption, embedding })
    }

    async fn analyze_text(&self, text: &str) -> Result<Vec<f32>> {
        self.record("analyze_text", text);
        self.simulate_latency().await;
        if self.config.fail_text {
            return Err(Error::Upstream("mock analyzeText failure".to_string()));
        }
        Ok(MockEmbeddingGenerator::generate(text, self.config.dimension))
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Mock embedding generator with deterministic output.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Generate a deterministic unit-length embedding from text.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension.max(1)];
        let len = vec.len();

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % len;
            vec[idx] += 0.1;
        }

        Self::normalize(&mut vec);
        vec.truncate(dimension);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vec.iter_mut() {
                *x /= norm;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic_image_analysis() {
        let backend = MockInferenceBackend::new();
        let a = backend.analyze_image("http://h/normalized/7.jpg").await.unwrap();
        let b = backend.analyze_image("http://h/normalized/7.jpg").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.caption, "mock caption for 7.jpg");
        assert_eq!(a.embedding.len(), EMBED_DIMENSION);
        assert_eq!(backend.image_call_count(), 2);
    }

    #[tokio::test]
    async fn test_fixed_caption() {
        let backend = MockInferenceBackend::new().with_caption("a red bicycle");
        let a = backend.analyze_image("x").await.unwrap();
        assert_eq!(a.caption, "a red bicycle");
    }

    #[tokio::test]
    async fn test_failures() {
        let backend = MockInferenceBackend::new().failing_images().failing_text();
        assert!(matches!(
            backend.analyze_image("x").await,
            Err(Error::Upstream(_))
        ));
        assert!(matches!(backend.analyze_text("x").await, Err(Error::Upstream(_))));
        assert_eq!(backend.calls().len(), 2);
    }

    #[test]
    fn test_generated_embedding_is_unit_length() {
        let v = MockEmbeddingGenerator::generate("hello world", 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = MockEmbeddingGenerator::generate("", 8);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
