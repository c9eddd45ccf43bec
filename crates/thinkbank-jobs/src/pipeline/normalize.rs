//! Normalize stage: turn an uploaded original into its canonical form.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use thinkbank_core::{
    file_extension, is_image_extension, AssetId, AssetPayload, AssetRepository, CaptureMetadata,
    Error, Result, StorageService,
};
use thinkbank_media::{DecodedMedia, MediaDecoder};

use crate::fetch::SourceFetcher;
use crate::handler::{Message, MessageHandler};
use crate::queue::{PublishOutcome, TopicQueue};

use super::{date_sub_path, storage_name};

/// Output of a successful normalization.
#[derive(Debug, Clone)]
pub struct NormalizedAsset {
    pub path: String,
    pub capture: Option<CaptureMetadata>,
}

/// Consumer for the normalize topic.
///
/// Every message results in exactly one publish to the embed topic: with the
/// normalized path on success, with the original path otherwise.
pub struct NormalizeStage {
    assets: Arc<dyn AssetRepository>,
    storage: Arc<dyn StorageService>,
    decoder: Arc<dyn MediaDecoder>,
    fetcher: SourceFetcher,
    queue: Arc<TopicQueue<AssetPayload>>,
    embed_topic: String,
}

impl NormalizeStage {
    pub fn new(
        assets: Arc<dyn AssetRepository>,
        storage: Arc<dyn StorageService>,
        decoder: Arc<dyn MediaDecoder>,
        queue: Arc<TopicQueue<AssetPayload>>,
        embed_topic: impl Into<String>,
    ) -> Self {
        Self {
            assets,
            storage,
            decoder,
            fetcher: SourceFetcher::new(),
            queue,
            embed_topic: embed_topic.into(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: SourceFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Fetch, decode, and store one asset. Does not touch the record.
    pub async fn normalize(&self, payload: &AssetPayload) -> Result<NormalizedAsset> {
        let bytes = self.fetcher.fetch(&payload.path).await?;
        let ext = file_extension(&payload.path);

        let decoded = if is_image_extension(&ext) {
            let decoder = self.decoder.clone();
            let source_ext = ext.clone();
            tokio::task::spawn_blocking(move || decoder.decode(&bytes, &source_ext))
                .await
                .map_err(|e| Error::Internal(format!("decode task failed: {}", e)))??
        } else {
            debug!(extension = %ext, "Passthrough, no decode");
            DecodedMedia {
                bytes,
                extension: ext,
                capture: None,
            }
        };

        let name = storage_name(payload.asset_id, &decoded.extension);
        let path = self
            .storage
            .put(&name, &decoded.bytes, &date_sub_path())
            .await?;

        Ok(NormalizedAsset {
            path,
            capture: decoded.capture,
        })
    }

    fn forward(&self, asset_id: AssetId, path: String) {
        let outcome = self
            .queue
            .publish(&self.embed_topic, AssetPayload::new(asset_id, path));
        if outcome != PublishOutcome::Enqueued {
            debug!(asset_id, outcome = ?outcome, "Embed message not enqueued");
        }
    }
}

#[async_trait]
impl MessageHandler<AssetPayload> for NormalizeStage {
    #[instrument(
        skip(self, message),
        fields(subsystem = "pipeline", component = "normalize", asset_id = message.payload.asset_id)
    )]
    async fn handle(&self, message: Message<AssetPayload>) -> Result<()> {
        let start = Instant::now();
        let payload = message.payload;

        match self.normalize(&payload).await {
            Ok(normalized) => {
                if let Err(e) = self
                    .assets
                    .set_normalized(payload.asset_id, &normalized.path, normalized.capture.as_ref())
                    .await
                {
                    warn!(error = %e, path = %normalized.path, "Failed to record normalized path");
                }
                info!(
                    path = %normalized.path,
                    has_capture = normalized.capture.is_some(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Asset normalized"
                );
                self.forward(payload.asset_id, normalized.path);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %payload.path,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Normalize failed, forwarding original"
                );
                self.forward(payload.asset_id, payload.path);
            }
        }
        Ok(())
    }
}
