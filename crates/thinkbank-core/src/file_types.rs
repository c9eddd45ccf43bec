//! File extension helpers and asset type classification.

use crate::models::AssetType;

/// Extensions classified as documents.
pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".doc", ".docx", ".md", ".txt", ".log", ".ppt", ".pptx", ".xls", ".xlsx", ".pdf",
];

/// Extensions classified as images (and routed through the media decoder).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".webp", ".gif", ".heic", ".heif", ".livp", ".apng",
];

/// Lower-cased extension of a file name, path, or URL, including the dot.
///
/// Query strings and fragments are ignored so that `.../5.heic?sig=x` yields
/// `.heic`. Returns an empty string when there is no extension.
pub fn file_extension(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 || name.len() > 1 => name[idx..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Classify an extension (with or without a leading dot, any case).
pub fn classify_extension(ext: &str) -> AssetType {
    let ext = normalize_extension(ext);
    if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        AssetType::Document
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        AssetType::Image
    } else {
        AssetType::Unknown
    }
}

/// Classify a file name by its extension.
pub fn classify_file_name(file_name: &str) -> AssetType {
    classify_extension(&file_extension(file_name))
}

/// Whether the extension names a format handled by the media decoder.
pub fn is_image_extension(ext: &str) -> bool {
    classify_extension(ext) == AssetType::Image
}

/// Lower-case an extension and ensure it carries a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
