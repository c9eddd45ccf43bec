//! Error types for media decoding.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Error, Debug)]
pub enum MediaError {
    /// Bytes could not be decoded as the claimed format.
    #[error("failed to decode {format}: {reason}")]
    Decode { format: String, reason: String },

    /// Decoded pixels could not be re-encoded as JPEG.
    #[error("failed to encode JPEG: {0}")]
    Encode(String),

    /// The LIVP container is not a readable zip archive.
    #[error("invalid livp archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("no image found in livp")]
    NoEmbeddedImage,

    #[error("there was an i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub(crate) fn decode(format: &str, reason: impl ToString) -> Self {
        MediaError::Decode {
            format: format.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<MediaError> for thinkbank_core::Error {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Io(io) => thinkbank_core::Error::Io(io),
            other => thinkbank_core::Error::Decode(other.to_string()),
        }
    }
}
