//! Request-scoped file cleanup

use crate::config::UploadConfig;
use crate::naming::{file_name_from_url, public_url, stored_name};
use crate::validation::{validate_image_type, validate_size};
use crate::StorageResult;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file written to the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Multipart field the file arrived under
    pub field: String,
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl StoredFile {
    pub fn url(&self) -> String {
        public_url(&self.stored_name)
    }
}

/// Files written while handling one request.
///
/// Unless [`StoredBatch::commit`] is called every registered file is
/// removed, either explicitly through [`StoredBatch::discard`] or, when the
/// batch is dropped early (timeouts, panics), synchronously on drop.
#[derive(Debug)]
pub struct StoredBatch {
    upload_dir: PathBuf,
    max_file_size: u64,
    files: Vec<StoredFile>,
    armed: bool,
}

impl StoredBatch {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            max_file_size: config.max_file_size,
            files: Vec::new(),
            armed: true,
        }
    }

    /// Validate and write one file, registering it for cleanup
    pub async fn store(
        &mut self,
        field: &str,
        original_name: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> StorageResult<&StoredFile> {
        validate_image_type(original_name, content_type)?;
        validate_size(data.len() as u64, self.max_file_size)?;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let name = stored_name(original_name);
        let path = self.upload_dir.join(&name);
        tokio::fs::write(&path, &data).await?;
        debug!(field, file = %name, size = data.len(), "Stored upload");

        self.files.push(StoredFile {
            field: field.to_string(),
            original_name: original_name.to_string(),
            stored_name: name,
            path,
            size: data.len() as u64,
        });
        let index = self.files.len() - 1;
        Ok(&self.files[index])
    }

    /// Track a file written elsewhere
    pub fn register(&mut self, file: StoredFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[StoredFile] {
        &self.files
    }

    pub fn field(&self, field: &str) -> impl Iterator<Item = &StoredFile> + '_ {
        let field = field.to_string();
        self.files.iter().filter(move |file| file.field == field)
    }

    pub fn first(&self, field: &str) -> Option<&StoredFile> {
        self.files.iter().find(|file| file.field == field)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Keep the files; the batch no longer owns them
    pub fn commit(mut self) -> Vec<StoredFile> {
        self.armed = false;
        std::mem::take(&mut self.files)
    }

    /// Remove every registered file, logging failures
    pub async fn discard(mut self) {
        self.armed = false;
        let files = std::mem::take(&mut self.files);
        for file in &files {
            remove_path(&file.path).await;
        }
        if !files.is_empty() {
            warn!(count = files.len(), "Removed uploaded files after failed request");
        }
    }
}

impl Drop for StoredBatch {
    fn drop(&mut self) {
        if !self.armed || self.files.is_empty() {
            return;
        }
        for file in &self.files {
            if let Err(e) = std::fs::remove_file(&file.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %file.path.display(), error = %e, "Failed to remove abandoned upload");
                }
            }
        }
        warn!(count = self.files.len(), "Removed uploads of an abandoned request");
    }
}

async fn remove_path(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// Best-effort removal of stored files referenced by public URLs.
///
/// URLs that do not point into the upload directory are ignored.
pub async fn remove_public_files<I, S>(upload_dir: &Path, urls: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for url in urls {
        if let Some(name) = file_name_from_url(url.as_ref()) {
            remove_path(&upload_dir.join(name)).await;
        }
    }
}
