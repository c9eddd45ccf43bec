//! Embed stage: caption and embed a normalized asset.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, instrument};

use thinkbank_core::{AssetPayload, AssetRepository, InferenceBackend, Result};

use crate::handler::{Message, MessageHandler};

/// Consumer for the embed topic. Failures are returned to the queue, which
/// logs and drops the message.
pub struct EmbedStage {
    assets: Arc<dyn AssetRepository>,
    inference: Arc<dyn InferenceBackend>,
}

impl EmbedStage {
    pub fn new(assets: Arc<dyn AssetRepository>, inference: Arc<dyn InferenceBackend>) -> Self {
        Self { assets, inference }
    }
}

#[async_trait]
impl MessageHandler<AssetPayload> for EmbedStage {
    #[instrument(
        skip(self, message),
        fields(subsystem = "pipeline", component = "embed", asset_id = message.payload.asset_id)
    )]
    async fn handle(&self, message: Message<AssetPayload>) -> Result<()> {
        let start = Instant::now();
        let payload = message.payload;

        let analysis = self.inference.analyze_image(&payload.path).await?;
        self.assets
            .set_analysis(payload.asset_id, &analysis.caption, &analysis.embedding)
            .await?;

        info!(
            caption_len = analysis.caption.len(),
            dimension = analysis.embedding.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Asset embedded"
        );
        Ok(())
    }
}
