//! # thinkbank-inference
//!
//! Clients for the external captioning/embedding service.
//!
//! This crate provides:
//! - [`HttpInferenceBackend`], speaking the model service's form-encoded
//!   `analyzeImage` / `analyzeText` protocol
//! - [`mock::MockInferenceBackend`] (feature `mock`) producing deterministic
//!   captions and embeddings
//!
//! # Example
//!
//! ```rust,no_run
//! use thinkbank_inference::{HttpInferenceBackend, InferenceBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = HttpInferenceBackend::from_env();
//!     let analysis = backend
//!         .analyze_image("http://localhost:8080/normalized/2025/01/02/1.jpg")
//!         .await
//!         .unwrap();
//!     println!("{}", analysis.caption);
//! }
//! ```

pub mod http;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use thinkbank_core::*;

pub use http::HttpInferenceBackend;
