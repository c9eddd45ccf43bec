//! Core data models for thinkbank.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::EMBED_DIMENSION;
use crate::error::{Error, Result};

/// Identity assigned to an asset by the persistence layer.
pub type AssetId = i64;

// =============================================================================
// ASSET
// =============================================================================

/// Classified kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Document,
    Unknown,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Image => "image",
            AssetType::Document => "document",
            AssetType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(AssetType::Image),
            "document" => Ok(AssetType::Document),
            "unknown" | "" => Ok(AssetType::Unknown),
            other => Err(Error::InvalidInput(format!("unknown asset type: {}", other))),
        }
    }
}

/// One ingested media item and its derived metadata.
///
/// Creation is two-phase: the record is inserted to obtain its id, then the
/// raw storage path is filled in. `file_path`, `caption` and `embedding` stay
/// empty until the Normalize and Embed stages complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,
    pub file_name: String,
    pub asset_type: AssetType,
    /// Raw upload location.
    pub original_file_path: Option<String>,
    /// Normalized file location, set by the Normalize stage.
    pub file_path: Option<String>,
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub tags: Vec<String>,
    /// Capture metadata and other free-form attributes.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    /// Pipeline stage this asset has reached.
    pub fn stage(&self) -> AssetStage {
        if self.caption.is_some() && self.embedding.is_some() {
            AssetStage::Ready
        } else if self.file_path.is_some() {
            AssetStage::Normalized
        } else if self.original_file_path.is_some() {
            AssetStage::Uploaded
        } else {
            AssetStage::Created
        }
    }
}

/// Lifecycle position of an asset, derived from which fields are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStage {
    /// Record inserted, raw path not yet known.
    Created,
    Uploaded,
    Normalized,
    Ready,
}

/// Request for creating a new asset record.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub file_name: String,
    pub asset_type: AssetType,
    pub tags: Vec<String>,
}

impl NewAsset {
    /// Build a request, classifying the type from the filename.
    pub fn from_file_name(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let asset_type = crate::file_types::classify_file_name(&file_name);
        Self {
            file_name,
            asset_type,
            tags: Vec::new(),
        }
    }
}

// =============================================================================
// CAPTURE METADATA
// =============================================================================

/// Geolocation and capture time read from an image's EXIF block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl CaptureMetadata {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.captured_at.is_none()
    }

    /// Both coordinates, if present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

// =============================================================================
// PIPELINE MESSAGES
// =============================================================================

/// Payload carried by both pipeline topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPayload {
    pub asset_id: AssetId,
    pub path: String,
}

impl AssetPayload {
    pub fn new(asset_id: AssetId, path: impl Into<String>) -> Self {
        Self {
            asset_id,
            path: path.into(),
        }
    }
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Caption and embedding returned by the image-analysis operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub caption: String,
    pub embedding: Vec<f32>,
}

/// Reject embeddings that do not match the corpus dimensionality.
pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBED_DIMENSION {
        return Err(Error::InvalidInput(format!(
            "embedding has {} dimensions, expected {}",
            embedding.len(),
            EMBED_DIMENSION
        )));
    }
    Ok(())
}

// =============================================================================
// SEARCH
// =============================================================================

/// Lexical relevance hit (`score >= 0`, higher is better).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalHit {
    pub asset_id: AssetId,
    pub score: f64,
}

/// Nearest-neighbour hit (`distance >= 0`, lower is better).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub asset_id: AssetId,
    pub distance: f64,
}

impl VectorHit {
    /// Map distance onto `(0, 1]`, monotonically decreasing.
    pub fn similarity(&self) -> f64 {
        1.0 / (1.0 + self.distance)
    }
}

/// Transient fused ranking entry; exists only for one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchResult {
    pub asset_id: AssetId,
    pub fused_score: f64,
}

// =============================================================================
// STORAGE
// =============================================================================

/// Directory listing entry returned by a storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    pub modified: DateTime<Utc>,
}
