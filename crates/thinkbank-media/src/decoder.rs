//! Extension-dispatched decoding into normalized JPEG.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::{debug, instrument};

use thinkbank_core::defaults::{JPEG_QUALITY, LIVP_MAX_ENTRY_BYTES, NORMALIZED_EXTENSION};
use thinkbank_core::file_types::normalize_extension;
use thinkbank_core::CaptureMetadata;

use crate::capture::read_capture_metadata;
use crate::error::{MediaError, Result};
use crate::livp::extract_embedded_image;

/// Result of normalizing one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMedia {
    pub bytes: Vec<u8>,
    /// Lower-cased extension with leading dot. `.jpg` for every decoded image.
    pub extension: String,
    pub capture: Option<CaptureMetadata>,
}

impl DecodedMedia {
    fn passthrough(bytes: &[u8], extension: String) -> Self {
        Self {
            bytes: bytes.to_vec(),
            extension,
            capture: None,
        }
    }

    /// Whether the source went through a decode/encode cycle.
    pub fn was_transcoded(&self) -> bool {
        self.extension == NORMALIZED_EXTENSION
    }
}

/// Converts source bytes plus a format tag into normalized bytes.
///
/// Implementations are CPU-bound and synchronous; async callers should run
/// them on a blocking thread.
pub trait MediaDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], ext: &str) -> Result<DecodedMedia>;
}

/// Source format family, chosen from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Formats the `image` crate decodes directly.
    Generic,
    Heif,
    Livp,
    Passthrough,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Self {
        match normalize_extension(ext).as_str() {
            ".jpg" | ".jpeg" | ".png" | ".gif" | ".webp" | ".apng" => SourceFormat::Generic,
            ".heic" | ".heif" => SourceFormat::Heif,
            ".livp" => SourceFormat::Livp,
            _ => SourceFormat::Passthrough,
        }
    }
}

/// Default [`MediaDecoder`] re-encoding every image as JPEG.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    quality: u8,
    max_entry_bytes: u64,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self {
            quality: JPEG_QUALITY,
            max_entry_bytes: LIVP_MAX_ENTRY_BYTES,
        }
    }
}

impl ImageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn with_max_entry_bytes(mut self, max: u64) -> Self {
        self.max_entry_bytes = max;
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn decode_image(&self, bytes: &[u8], ext: &str) -> Result<DecodedMedia> {
        let image = match SourceFormat::from_extension(ext) {
            SourceFormat::Heif => decode_heif_or_fallback(bytes, ext)?,
            _ => image::load_from_memory(bytes).map_err(|e| MediaError::decode(ext, e))?,
        };
        let jpeg = encode_jpeg(&image, self.quality)?;
        Ok(DecodedMedia {
            bytes: jpeg,
            extension: NORMALIZED_EXTENSION.to_string(),
            capture: read_capture_metadata(bytes),
        })
    }
}

impl MediaDecoder for ImageDecoder {
    #[instrument(skip(self, bytes), fields(subsystem = "media", component = "decoder", bytes = bytes.len()))]
    fn decode(&self, bytes: &[u8], ext: &str) -> Result<DecodedMedia> {
        let ext = normalize_extension(ext);
        let format = SourceFormat::from_extension(&ext);
        debug!(format = ?format, "Dispatching media decode");

        match format {
            SourceFormat::Generic | SourceFormat::Heif => self.decode_image(bytes, &ext),
            SourceFormat::Livp => {
                let embedded = extract_embedded_image(bytes, self.max_entry_bytes)?;
                self.decode_image(&embedded.bytes, &embedded.extension)
            }
            SourceFormat::Passthrough => Ok(DecodedMedia::passthrough(bytes, ext)),
        }
    }
}

/// Decode with the default [`ImageDecoder`].
pub fn decode(bytes: &[u8], ext: &str) -> Result<DecodedMedia> {
    ImageDecoder::default().decode(bytes, ext)
}

#[cfg(feature = "heif")]
fn decode_heif_or_fallback(bytes: &[u8], _ext: &str) -> Result<DynamicImage> {
    match crate::heif::decode_heif(bytes) {
        Ok(image) => Ok(image),
        Err(heif_err) => {
            // Mislabelled files (a JPEG named .heic) still decode generically.
            image::load_from_memory(bytes).map_err(|_| heif_err)
        }
    }
}

#[cfg(not(feature = "heif"))]
fn decode_heif_or_fallback(bytes: &[u8], ext: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| {
        MediaError::decode(ext, format!("{} (built without the `heif` feature)", e))
    })
}

/// Encode as baseline JPEG, dropping alpha.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
