//! Hybrid search engine combining full-text ranking and vector similarity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use thinkbank_core::defaults::{SEARCH_ALPHA, SEARCH_TOP_K};
use thinkbank_core::{
    file_extension, AssetId, AssetRepository, AssetSearchIndex, InferenceBackend, MediaAsset,
    Result, StorageService,
};

use crate::fusion::{fuse_scores, similarities};

/// Configuration for hybrid search.
#[derive(Debug, Clone, Copy)]
pub struct HybridSearchConfig {
    /// Maximum results returned, and the candidate count fetched per ranker.
    pub top_k: usize,
    /// Lexical weight (0.0 to 1.0); vector weight is `1 - alpha`.
    pub alpha: f64,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            top_k: SEARCH_TOP_K,
            alpha: SEARCH_ALPHA,
        }
    }
}

impl HybridSearchConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the lexical weight, clamped to `[0, 1]`.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = if alpha.is_nan() { SEARCH_ALPHA } else { alpha.clamp(0.0, 1.0) };
        self
    }

    /// Lexical ranking only.
    pub fn lexical_only() -> Self {
        Self::default().with_alpha(1.0)
    }

    /// Vector ranking only.
    pub fn semantic_only() -> Self {
        Self::default().with_alpha(0.0)
    }
}

/// Hybrid search engine.
pub struct HybridSearchEngine {
    index: Arc<dyn AssetSearchIndex>,
    assets: Arc<dyn AssetRepository>,
    inference: Arc<dyn InferenceBackend>,
    tmp_storage: Arc<dyn StorageService>,
}

impl HybridSearchEngine {
    /// `tmp_storage` holds query images for [`search_by_image`](Self::search_by_image).
    pub fn new(
        index: Arc<dyn AssetSearchIndex>,
        assets: Arc<dyn AssetRepository>,
        inference: Arc<dyn InferenceBackend>,
        tmp_storage: Arc<dyn StorageService>,
    ) -> Self {
        Self {
            index,
            assets,
            inference,
            tmp_storage,
        }
    }

    /// Ranked assets for a text query.
    ///
    /// A blank query skips lexical ranking; the vector side still runs.
    #[instrument(skip(self), fields(subsystem = "search", component = "hybrid_search", op = "search"))]
    pub async fn search(&self, query: &str, top_k: usize, alpha: f64) -> Result<Vec<MediaAsset>> {
        let config = HybridSearchConfig::default()
            .with_top_k(top_k)
            .with_alpha(alpha);
        self.search_with_config(query, &config).await
    }

    pub async fn search_with_config(
        &self,
        query: &str,
        config: &HybridSearchConfig,
    ) -> Result<Vec<MediaAsset>> {
        let start = Instant::now();
        if config.top_k == 0 {
            return Ok(Vec::new());
        }
        let k = config.top_k as i64;

        let embedding = self.inference.analyze_text(query).await?;

        let lexical = if query.trim().is_empty() {
            debug!("Blank query, lexical ranking skipped");
            Vec::new()
        } else {
            self.index.lexical_top_k(query, k).await?
        };

        let vector = self.index.vector_top_k(&embedding, k).await?;
        let fused = fuse_scores(&lexical, &similarities(&vector), config.alpha, config.top_k);
        let ids: Vec<AssetId> = fused.iter().map(|r| r.asset_id).collect();
        let results = self.hydrate(&ids).await?;

        info!(
            lexical_hits = lexical.len(),
            semantic_hits = vector.len(),
            result_count = results.len(),
            alpha = config.alpha,
            duration_ms = start.elapsed().as_millis() as u64,
            "Hybrid search completed"
        );
        Ok(results)
    }

    /// Nearest assets to a query image, in distance order.
    ///
    /// The image is written to temporary storage under a random name so the
    /// inference service can fetch it, and removed afterwards.
    #[instrument(skip(self, bytes), fields(subsystem = "search", component = "hybrid_search", op = "search_by_image", bytes = bytes.len()))]
    pub async fn search_by_image(
        &self,
        bytes: &[u8],
        file_name: &str,
        top_k: usize,
    ) -> Result<Vec<MediaAsset>> {
        let start = Instant::now();
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let temp_name = format!("{}{}", Uuid::new_v4().simple(), file_extension(file_name));
        let location = self.tmp_storage.put(&temp_name, bytes, "").await?;
        let analysis = self.inference.analyze_image(&location).await;
        if let Err(e) = self.tmp_storage.delete(&temp_name).await {
            warn!(error = %e, name = %temp_name, "Failed to remove temporary query image");
        }
        let analysis = analysis?;

        let vector = self
            .index
            .vector_top_k(&analysis.embedding, top_k as i64)
            .await?;
        let ids: Vec<AssetId> = vector.iter().map(|h| h.asset_id).collect();
        let results = self.hydrate(&ids).await?;

        info!(
            semantic_hits = vector.len(),
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Image search completed"
        );
        Ok(results)
    }

    /// Load assets for `ids`, preserving order and skipping ids that no
    /// longer resolve.
    async fn hydrate(&self, ids: &[AssetId]) -> Result<Vec<MediaAsset>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut by_id: HashMap<AssetId, MediaAsset> = self
            .assets
            .fetch_many(ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let ordered: Vec<MediaAsset> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        if ordered.len() < ids.len() {
            debug!(
                missing = ids.len() - ordered.len(),
                "Skipped ranked ids that failed to hydrate"
            );
        }
        Ok(ordered)
    }
}

/// Builder for hybrid search requests.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    config: HybridSearchConfig,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            config: HybridSearchConfig::default(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.config = self.config.with_top_k(top_k);
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.config = self.config.with_alpha(alpha);
        self
    }

    pub fn with_config(mut self, config: HybridSearchConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn execute(self, engine: &HybridSearchEngine) -> Result<Vec<MediaAsset>> {
        engine.search_with_config(&self.query, &self.config).await
    }
}
