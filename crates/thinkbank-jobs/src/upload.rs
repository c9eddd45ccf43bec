//! Upload producer: record, store, and enqueue new files.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use thinkbank_core::defaults::TOPIC_NORMALIZE;
use thinkbank_core::{
    file_extension, AssetId, AssetPayload, AssetRepository, AssetType, NewAsset, Result,
    StorageService,
};

use crate::pipeline::{date_sub_path, storage_name};
use crate::queue::TopicQueue;

/// A file accepted by [`UploadService::upload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedAsset {
    pub id: AssetId,
    pub file_name: String,
    pub asset_type: AssetType,
    pub original_file_path: String,
}

/// One file in a batch upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Accepts raw files and starts them through the pipeline.
pub struct UploadService {
    assets: Arc<dyn AssetRepository>,
    storage: Arc<dyn StorageService>,
    queue: Arc<TopicQueue<AssetPayload>>,
}

impl UploadService {
    /// `storage` receives the raw originals.
    pub fn new(
        assets: Arc<dyn AssetRepository>,
        storage: Arc<dyn StorageService>,
        queue: Arc<TopicQueue<AssetPayload>>,
    ) -> Self {
        Self {
            assets,
            storage,
            queue,
        }
    }

    /// Record and store one file, then publish it for normalization.
    ///
    /// If storing the bytes fails the new record is deleted again.
    #[instrument(skip(self, bytes), fields(subsystem = "upload", bytes = bytes.len()))]
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<UploadedAsset> {
        let request = NewAsset::from_file_name(file_name);
        let asset_type = request.asset_type;
        let id = self.assets.insert(request).await?;

        let name = storage_name(id, &file_extension(file_name));
        let path = match self.storage.put(&name, bytes, &date_sub_path()).await {
            Ok(path) => path,
            Err(e) => {
                warn!(asset_id = id, error = %e, "Store failed, removing record");
                if let Err(cleanup) = self.assets.delete(id).await {
                    warn!(asset_id = id, error = %cleanup, "Failed to remove orphan record");
                }
                return Err(e);
            }
        };

        self.assets.set_original_path(id, &path).await?;
        let _ = self
            .queue
            .publish(TOPIC_NORMALIZE, AssetPayload::new(id, path.clone()));

        info!(asset_id = id, asset_type = %asset_type, path = %path, "File uploaded");
        Ok(UploadedAsset {
            id,
            file_name: file_name.to_string(),
            asset_type,
            original_file_path: path,
        })
    }

    /// Upload files in order, stopping at the first failure.
    pub async fn upload_many(&self, files: &[UploadFile]) -> Result<Vec<UploadedAsset>> {
        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            uploaded.push(self.upload(&file.file_name, &file.bytes).await?);
        }
        Ok(uploaded)
    }
}
