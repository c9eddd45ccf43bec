//! # thinkbank-media
//!
//! Normalizes heterogeneous uploads into a canonical form: every supported
//! image becomes a JPEG, LIVP archives give up their still image, and other
//! files pass through untouched. Capture metadata is read from EXIF along
//! the way.
//!
//! | Extension | Handling |
//! |-----------|----------|
//! | `.jpg .jpeg .png .gif .webp .apng` | decode, re-encode JPEG |
//! | `.heic .heif` | libheif (feature `heif`) or generic fallback, re-encode JPEG |
//! | `.livp` | first still image in the zip, then as above |
//! | anything else | passthrough |

pub mod capture;
pub mod decoder;
pub mod error;
#[cfg(feature = "heif")]
pub mod heif;
pub mod livp;

/// Whether this build decodes HEIC/HEIF natively through libheif.
pub const HEIF_SUPPORTED: bool = cfg!(feature = "heif");

pub use capture::read_capture_metadata;
pub use decoder::{decode, encode_jpeg, DecodedMedia, ImageDecoder, MediaDecoder, SourceFormat};
pub use error::{MediaError, Result};
pub use livp::{extract_embedded_image, EmbeddedImage, LIVP_IMAGE_SUFFIXES};
