//! File validation utilities

use crate::{StorageError, StorageResult};
use std::path::Path;

/// Accepted image extensions, lowercase
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// Accepted `image/*` subtypes
const ALLOWED_IMAGE_SUBTYPES: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// Lowercased extension without the dot
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Both the extension and the declared MIME type must name a supported image format
pub fn validate_image_type(file_name: &str, content_type: Option<&str>) -> StorageResult<()> {
    let extension_ok = extension_of(file_name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);

    let mime_ok = content_type
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .map(|m| {
            m.type_() == mime::IMAGE
                && ALLOWED_IMAGE_SUBTYPES.contains(&m.subtype().as_str().to_ascii_lowercase().as_str())
        })
        .unwrap_or(false);

    if extension_ok && mime_ok {
        Ok(())
    } else {
        Err(StorageError::UnsupportedFileType(format!(
            "{} ({}); only jpeg, jpg, png, gif and webp images are allowed",
            file_name,
            content_type.unwrap_or("unknown type")
        )))
    }
}

pub fn validate_size(size: u64, max: u64) -> StorageResult<()> {
    if size > max {
        return Err(StorageError::FileTooLarge(size, max));
    }
    Ok(())
}

pub fn validate_count(count: usize, max: usize) -> StorageResult<()> {
    if count > max {
        return Err(StorageError::TooManyFiles(count, max));
    }
    Ok(())
}
