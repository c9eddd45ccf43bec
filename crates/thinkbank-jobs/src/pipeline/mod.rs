//! Two-stage ingestion pipeline driven by the topic queue.
//!
//! ```text
//! upload ──▶ normalize_file ──▶ NormalizeStage ──▶ embedding_file ──▶ EmbedStage
//!                                (decode, store)                    (caption, vector)
//! ```
//!
//! Stages share no state beyond the queue and the repositories. A failed
//! stage leaves the asset at its previous lifecycle step.

mod embed;
mod normalize;

pub use embed::EmbedStage;
pub use normalize::{NormalizeStage, NormalizedAsset};

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::info;

use thinkbank_core::defaults::{
    DATE_SUBPATH_FORMAT, EMBED_WORKERS, ENV_EMBED_WORKERS, ENV_NORMALIZE_WORKERS,
    NORMALIZE_WORKERS, TOPIC_EMBED, TOPIC_NORMALIZE,
};
use thinkbank_core::{
    AssetId, AssetPayload, AssetRepository, InferenceBackend, Result, StorageService,
};
use thinkbank_media::MediaDecoder;

use crate::queue::{QueueConfig, TopicQueue};

/// Storage file name for an asset: `"{id}{ext}"`.
pub fn storage_name(asset_id: AssetId, extension: &str) -> String {
    format!("{}{}", asset_id, extension)
}

/// Date sub-path (`YYYY/MM/DD`, local time) for files stored now.
pub fn date_sub_path() -> String {
    date_sub_path_at(Local::now())
}

pub fn date_sub_path_at(at: DateTime<Local>) -> String {
    at.format(DATE_SUBPATH_FORMAT).to_string()
}

/// Worker counts and queue settings for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub normalize_workers: usize,
    pub embed_workers: usize,
    pub queue: QueueConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize_workers: NORMALIZE_WORKERS,
            embed_workers: EMBED_WORKERS,
            queue: QueueConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `NORMALIZE_WORKERS` | `3` |
    /// | `EMBED_WORKERS` | `3` |
    /// | `QUEUE_CAPACITY` | `1000` |
    /// | `QUEUE_FAULT_POLICY` | `exit` |
    pub fn from_env() -> Self {
        let normalize_workers = std::env::var(ENV_NORMALIZE_WORKERS)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(NORMALIZE_WORKERS);

        let embed_workers = std::env::var(ENV_EMBED_WORKERS)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(EMBED_WORKERS);

        Self {
            normalize_workers,
            embed_workers,
            queue: QueueConfig::from_env(),
        }
    }

    pub fn with_normalize_workers(mut self, n: usize) -> Self {
        self.normalize_workers = n.max(1);
        self
    }

    pub fn with_embed_workers(mut self, n: usize) -> Self {
        self.embed_workers = n.max(1);
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }
}

/// Owns the two stages and registers them on a shared queue.
pub struct IngestionPipeline {
    config: PipelineConfig,
    queue: Arc<TopicQueue<AssetPayload>>,
    normalize: Arc<NormalizeStage>,
    embed: Arc<EmbedStage>,
}

impl IngestionPipeline {
    /// Build the pipeline.
    ///
    /// `normalized_storage` receives the canonical files written by the
    /// normalize stage.
    pub fn new(
        config: PipelineConfig,
        queue: Arc<TopicQueue<AssetPayload>>,
        assets: Arc<dyn AssetRepository>,
        normalized_storage: Arc<dyn StorageService>,
        decoder: Arc<dyn MediaDecoder>,
        inference: Arc<dyn InferenceBackend>,
    ) -> Self {
        let normalize = NormalizeStage::new(
            assets.clone(),
            normalized_storage,
            decoder,
            queue.clone(),
            TOPIC_EMBED,
        );
        let embed = EmbedStage::new(assets, inference);
        Self {
            config,
            queue,
            normalize: Arc::new(normalize),
            embed: Arc::new(embed),
        }
    }

    /// Replace the normalize stage, e.g. to inject a custom fetcher.
    pub fn with_normalize_stage(mut self, stage: NormalizeStage) -> Self {
        self.normalize = Arc::new(stage);
        self
    }

    pub fn queue(&self) -> &Arc<TopicQueue<AssetPayload>> {
        &self.queue
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Register both stages' workers. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        self.queue.register_consumers(
            TOPIC_NORMALIZE,
            self.normalize.clone(),
            self.config.normalize_workers,
        )?;
        self.queue
            .register_consumers(TOPIC_EMBED, self.embed.clone(), self.config.embed_workers)?;

        info!(
            subsystem = "pipeline",
            normalize_workers = self.config.normalize_workers,
            embed_workers = self.config.embed_workers,
            "Ingestion pipeline started"
        );
        Ok(())
    }

    /// Stop accepting messages and drain in-flight work.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        info!(subsystem = "pipeline", "Ingestion pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_storage_name() {
        assert_eq!(storage_name(42, ".jpg"), "42.jpg");
        assert_eq!(storage_name(7, ""), "7");
    }

    #[test]
    fn test_date_sub_path_format() {
        let at = Local.with_ymd_and_hms(2025, 1, 2, 13, 4, 5).unwrap();
        assert_eq!(date_sub_path_at(at), "2025/01/02");
    }

    #[test]
    fn test_pipeline_config_builders() {
        let config = PipelineConfig::default()
            .with_normalize_workers(0)
            .with_embed_workers(5);
        assert_eq!(config.normalize_workers, 1);
        assert_eq!(config.embed_workers, 5);
    }
}
