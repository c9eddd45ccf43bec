//! LIVP (Live Photo) archives.
//!
//! A `.livp` file is a zip holding a still image (HEIC or JPEG) and a short
//! movie. Only the still image is kept.

use std::io::{Cursor, Read};

use tracing::{debug, trace};

use crate::error::{MediaError, Result};

/// Entry suffixes accepted as the still image, checked case-insensitively.
pub const LIVP_IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".heic"];

/// Still image pulled out of a LIVP archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub name: String,
    /// Lower-cased extension including the dot.
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Return the first readable image entry in enumeration order.
///
/// Entries that fail to open or read are skipped. An archive with no
/// matching entry yields [`MediaError::NoEmbeddedImage`]. A selected entry
/// larger than `max_entry_bytes` is a decode error rather than a truncated
/// still.
pub fn extract_embedded_image(data: &[u8], max_entry_bytes: u64) -> Result<EmbeddedImage> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(subsystem = "media", component = "livp", index = i, error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let lower = name.to_ascii_lowercase();
        let Some(suffix) = LIVP_IMAGE_SUFFIXES.iter().find(|s| lower.ends_with(*s)) else {
            trace!(subsystem = "media", component = "livp", entry = %name, "Skipping non-image entry");
            continue;
        };

        if entry.size() > max_entry_bytes {
            return Err(oversized(&name, entry.size(), max_entry_bytes));
        }

        // The declared size can lie; read one byte past the cap to catch it.
        let mut bytes = Vec::new();
        if let Err(e) = (&mut entry)
            .take(max_entry_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
        {
            debug!(subsystem = "media", component = "livp", entry = %name, error = %e, "Skipping unreadable entry");
            continue;
        }
        if bytes.len() as u64 > max_entry_bytes {
            return Err(oversized(&name, bytes.len() as u64, max_entry_bytes));
        }

        debug!(
            subsystem = "media",
            component = "livp",
            entry = %name,
            bytes = bytes.len(),
            "Selected embedded image"
        );
        return Ok(EmbeddedImage {
            name,
            extension: suffix.to_string(),
            bytes,
        });
    }

    Err(MediaError::NoEmbeddedImage)
}

fn oversized(name: &str, size: u64, limit: u64) -> MediaError {
    MediaError::decode(
        ".livp",
        format!("entry {} is {} bytes, limit is {}", name, size, limit),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, data) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_first_image_entry_wins() {
        let data = archive(&[
            ("IMG_0001.MOV", b"movie"),
            ("IMG_0001.HEIC", b"heic-bytes"),
            ("IMG_0001.JPG", b"jpg-bytes"),
        ]);
        let image = extract_embedded_image(&data, 1024).unwrap();
        assert_eq!(image.name, "IMG_0001.HEIC");
        assert_eq!(image.extension, ".heic");
        assert_eq!(image.bytes, b"heic-bytes");
    }

    #[test]
    fn test_no_image_entry() {
        let data = archive(&[("clip.mov", b"movie"), ("notes.txt", b"hello")]);
        assert!(matches!(
            extract_embedded_image(&data, 1024),
            Err(MediaError::NoEmbeddedImage)
        ));
    }

    #[test]
    fn test_empty_archive() {
        let data = archive(&[]);
        assert!(matches!(
            extract_embedded_image(&data, 1024),
            Err(MediaError::NoEmbeddedImage)
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            extract_embedded_image(b"definitely not zip", 1024),
            Err(MediaError::Archive(_))
        ));
    }

    #[test]
    fn test_oversized_entry_is_rejected() {
        let data = archive(&[("a.png", &[7u8; 64])]);
        match extract_embedded_image(&data, 16) {
            Err(MediaError::Decode { format, reason }) => {
                assert_eq!(format, ".livp");
                assert!(reason.contains("a.png"), "{}", reason);
                assert!(reason.contains("64"), "{}", reason);
            }
            other => panic!("expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_entry_at_limit_is_read_whole() {
        let data = archive(&[("a.png", &[7u8; 16])]);
        let image = extract_embedded_image(&data, 16).unwrap();
        assert_eq!(image.bytes, vec![7u8; 16]);
    }
}
