//! # folio-storage
//!
//! Upload handling for the folio portfolio CMS.
//!
//! - **Validation**: image extension, MIME type, size and file count limits
//! - **Naming**: collision-resistant stored names served under `/uploads/`
//! - **Concurrency gate**: bounded in-flight uploads with running statistics
//! - **Cleanup guard**: files written for a failed request are removed
//! - **Ordering**: gallery order derived from numbers in the original filenames

use thiserror::Error;

pub mod cleanup;
pub mod config;
pub mod gate;
pub mod naming;
pub mod ordering;
pub mod validation;

pub use cleanup::{remove_public_files, StoredBatch, StoredFile};
pub use config::UploadConfig;
pub use gate::{UploadGate, UploadPermit, UploadStats};
pub use naming::{file_name_from_url, public_url, stored_name};
pub use ordering::{
    append_uploads, apply_explicit_order, gallery_from_uploads, order_token, remove_by_order, reorder_from_json,
    OrderEntry, UploadedImage,
};

/// Upload errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(u64, u64),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Too many files: {0}, max allowed: {1}")]
    TooManyFiles(usize, usize),

    #[error("Too many concurrent uploads, please try again later")]
    TooManyUploads,

    #[error("File processing timed out")]
    Timeout,
}

impl StorageError {
    pub fn validation(message: impl Into<String>) -> Self {
        StorageError::Validation(message.into())
    }

    /// HTTP status for the error
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::Io(_) => 500,
            StorageError::Validation(_)
            | StorageError::FileTooLarge(..)
            | StorageError::UnsupportedFileType(_)
            | StorageError::TooManyFiles(..) => 400,
            StorageError::TooManyUploads => 429,
            StorageError::Timeout => 408,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Io(_) => "STORAGE_IO_ERROR",
            StorageError::Validation(_) => "UPLOAD_VALIDATION_ERROR",
            StorageError::FileTooLarge(..) => "FILE_TOO_LARGE",
            StorageError::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            StorageError::TooManyFiles(..) => "TOO_MANY_FILES",
            StorageError::TooManyUploads => "TOO_MANY_UPLOADS",
            StorageError::Timeout => "UPLOAD_TIMEOUT",
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StorageError::FileTooLarge(10, 5).status_code(), 400);
        assert_eq!(StorageError::TooManyFiles(11, 10).status_code(), 400);
        assert_eq!(StorageError::TooManyUploads.status_code(), 429);
        assert_eq!(StorageError::Timeout.status_code(), 408);
    }
}
