//! Native HEIF/HEIC decoding through libheif.

use image::{DynamicImage, RgbImage};
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

use crate::error::{MediaError, Result};

/// Decode the primary image of a HEIF container to RGB.
pub fn decode_heif(data: &[u8]) -> Result<DynamicImage> {
    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data).map_err(|e| MediaError::decode(".heic", e))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| MediaError::decode(".heic", e))?;
    let image = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| MediaError::decode(".heic", e))?;

    let planes = image.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| MediaError::decode(".heic", "no interleaved RGB plane"))?;

    let width = interleaved.width;
    let height = interleaved.height;
    let row_bytes = width as usize * 3;

    // Rows may be padded; copy row_bytes out of every stride.
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in interleaved.data.chunks(interleaved.stride).take(height as usize) {
        let row = row
            .get(..row_bytes)
            .ok_or_else(|| MediaError::decode(".heic", "short pixel row"))?;
        pixels.extend_from_slice(row);
    }

    let rgb = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| MediaError::decode(".heic", "pixel buffer size mismatch"))?;
    Ok(DynamicImage::ImageRgb8(rgb))
}
