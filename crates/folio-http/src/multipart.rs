//! Multipart upload pipeline
//!
//! [`process_upload`] takes a slot from the upload gate, receives the form
//! under the processing timeout and hands it to the route handler. Files
//! are validated before they are written and stay registered in the form's
//! [`StoredBatch`]; a handler that returns early without calling
//! [`UploadForm::commit`] leaves nothing behind on disk.

use crate::error::{HttpError, HttpResult};
use crate::state::AppState;
use axum::extract::multipart::Field;
use axum::extract::Multipart;
use bytes::BytesMut;
use folio_core::config::env::parse_bool;
use folio_storage::validation::{validate_count, validate_image_type};
use folio_storage::{StorageError, StoredBatch, StoredFile, UploadConfig, UploadedImage};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

/// A file field accepted by a route
#[derive(Debug, Clone, Copy)]
pub struct FileField {
    pub name: &'static str,
    pub max_count: usize,
}

/// File fields a route accepts
#[derive(Debug, Clone, Copy)]
pub struct UploadSpec {
    pub fields: &'static [FileField],
    /// Files per request; `None` uses the configured `max_files`
    pub max_total: Option<usize>,
}

/// Text fields plus the files written for one request
#[derive(Debug)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    batch: StoredBatch,
}

impl UploadForm {
    fn new(config: &UploadConfig) -> Self {
        Self {
            fields: HashMap::new(),
            batch: StoredBatch::new(config),
        }
    }

    /// Non-empty text value
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.text(name).and_then(parse_bool)
    }

    pub fn first(&self, field: &str) -> Option<&StoredFile> {
        self.batch.first(field)
    }

    /// Uploaded images of a field, in arrival order
    pub fn images(&self, field: &str) -> Vec<UploadedImage> {
        self.batch
            .field(field)
            .map(|file| UploadedImage::new(file.url(), file.original_name.clone()))
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.batch.len()
    }

    /// Keep the written files
    pub fn commit(self) -> Vec<StoredFile> {
        self.batch.commit()
    }

    pub async fn discard(self) {
        self.batch.discard().await
    }
}

/// Run `handler` over a received upload form, gated and time-limited.
///
/// Returns 429 when the gate is full and 408 when receiving plus handling
/// exceeds the processing timeout. Files of a request that fails or times
/// out are removed.
pub async fn process_upload<T, F, Fut>(
    state: &AppState,
    multipart: Multipart,
    spec: UploadSpec,
    handler: F,
) -> HttpResult<T>
where
    F: FnOnce(UploadForm) -> Fut,
    Fut: Future<Output = HttpResult<T>>,
{
    let permit = state.gate.try_acquire()?;
    let timeout = state.uploads.processing_timeout;

    let work = async {
        let form = receive(&state.uploads, multipart, spec).await?;
        debug!(files = form.file_count(), "Upload received");
        handler(form).await
    };

    let result = match tokio::time::timeout(timeout, work).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Upload processing timed out");
            Err(StorageError::Timeout.into())
        }
    };

    match &result {
        Ok(_) => permit.succeed(),
        Err(_) => permit.fail(),
    }
    result
}

async fn receive(config: &UploadConfig, multipart: Multipart, spec: UploadSpec) -> HttpResult<UploadForm> {
    let mut form = UploadForm::new(config);
    match read_fields(&mut form, config, multipart, spec).await {
        Ok(()) => Ok(form),
        Err(e) => {
            form.discard().await;
            Err(e)
        }
    }
}

async fn read_fields(
    form: &mut UploadForm,
    config: &UploadConfig,
    mut multipart: Multipart,
    spec: UploadSpec,
) -> HttpResult<()> {
    let max_total = spec.max_total.unwrap_or(config.max_files);
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    let mut total = 0usize;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await?;
            form.fields.insert(name, value);
            continue;
        };
        if file_name.is_empty() {
            // browsers send empty file inputs with no file name
            continue;
        }

        let accepted = spec
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| HttpError::bad_request(format!("Unexpected file field '{}'", name)))?;

        let count = counts.entry(accepted.name).or_default();
        *count += 1;
        total += 1;
        validate_count(*count, accepted.max_count)?;
        validate_count(total, max_total)?;

        let content_type = field.content_type().map(str::to_string);
        validate_image_type(&file_name, content_type.as_deref())?;

        let data = read_limited(field, config.max_file_size).await?;
        form.batch
            .store(accepted.name, &file_name, content_type.as_deref(), data.freeze())
            .await?;
    }

    Ok(())
}

/// Stream a file field, failing as soon as it exceeds `max`
async fn read_limited(mut field: Field<'_>, max: u64) -> HttpResult<BytesMut> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        let size = (data.len() + chunk.len()) as u64;
        if size > max {
            return Err(StorageError::FileTooLarge(size, max).into());
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}
