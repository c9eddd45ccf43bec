//! Core traits for thinkbank abstractions.
//!
//! These traits define the seams between the pipeline, search engine and
//! their backends, so each can be driven by a real implementation or a
//! test double.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ASSET REPOSITORY
// =============================================================================

/// Repository for media asset records.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Insert a new record and return its assigned id.
    async fn insert(&self, req: NewAsset) -> Result<AssetId>;

    /// Fetch a single asset.
    async fn fetch(&self, id: AssetId) -> Result<MediaAsset>;

    /// Fetch many assets by id. Order is unspecified and missing ids are
    /// simply absent from the result.
    async fn fetch_many(&self, ids: &[AssetId]) -> Result<Vec<MediaAsset>>;

    /// List assets, newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<MediaAsset>>;

    /// Record where the raw upload was stored.
    async fn set_original_path(&self, id: AssetId, path: &str) -> Result<()>;

    /// Record the normalized file location, merging capture metadata when present.
    async fn set_normalized(
        &self,
        id: AssetId,
        path: &str,
        capture: Option<&CaptureMetadata>,
    ) -> Result<()>;

    /// Persist caption and embedding together.
    async fn set_analysis(&self, id: AssetId, caption: &str, embedding: &[f32]) -> Result<()>;

    /// Delete a record.
    async fn delete(&self, id: AssetId) -> Result<()>;
}

// =============================================================================
// SEARCH INDEX
// =============================================================================

/// Lexical and vector ranking primitives over the asset corpus.
#[async_trait]
pub trait AssetSearchIndex: Send + Sync {
    /// Top `k` assets by full-text rank, best first.
    async fn lexical_top_k(&self, query: &str, k: i64) -> Result<Vec<LexicalHit>>;

    /// Top `k` assets by embedding distance, nearest first.
    async fn vector_top_k(&self, embedding: &[f32], k: i64) -> Result<Vec<VectorHit>>;
}

// =============================================================================
// STORAGE
// =============================================================================

/// Blob storage for raw, normalized and temporary files.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store `data` as `name` under `sub_path` and return its public location.
    async fn put(&self, name: &str, data: &[u8], sub_path: &str) -> Result<String>;

    /// Resolve the public location of an existing file.
    async fn get(&self, sub_path: &str) -> Result<String>;

    /// Remove a file. Missing files are not an error.
    async fn delete(&self, sub_path: &str) -> Result<()>;

    /// List a directory. A missing directory lists as empty.
    async fn list(&self, sub_path: &str) -> Result<Vec<FileEntry>>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Captioning and embedding service.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Caption and embed the image reachable at `url`.
    async fn analyze_image(&self, url: &str) -> Result<ImageAnalysis>;

    /// Embed free text into the same space as images.
    async fn analyze_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of returned embeddings.
    fn dimension(&self) -> usize {
        crate::defaults::EMBED_DIMENSION
    }
}
