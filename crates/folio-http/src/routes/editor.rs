//! Rich-text editor image upload

use crate::error::{HttpError, HttpResult};
use crate::extract::AuthUser;
use crate::multipart::{process_upload, FileField, UploadForm, UploadSpec};
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::debug;

const IMAGE_FIELDS: [&str; 3] = ["file", "image", "cover"];

const EDITOR_UPLOAD: UploadSpec = UploadSpec {
    fields: &[
        FileField {
            name: "file",
            max_count: 1,
        },
        FileField {
            name: "image",
            max_count: 1,
        },
        FileField {
            name: "cover",
            max_count: 1,
        },
    ],
    max_total: Some(1),
};

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload_image))
}

/// The editor reads `location` from the response body
#[derive(Debug, Serialize)]
pub struct EditorUpload {
    pub success: bool,
    pub location: String,
}

async fn upload_image(
    State(state): State<AppState>,
    _user: AuthUser,
    multipart: Multipart,
) -> HttpResult<Json<EditorUpload>> {
    let location = process_upload(&state, multipart, EDITOR_UPLOAD, keep_image).await?;
    Ok(Json(EditorUpload {
        success: true,
        location,
    }))
}

async fn keep_image(form: UploadForm) -> HttpResult<String> {
    let location = IMAGE_FIELDS
        .iter()
        .find_map(|field| form.first(field))
        .map(|file| file.url())
        .ok_or_else(|| HttpError::bad_request("Please upload an image"))?;

    form.commit();
    debug!(%location, "Editor image stored");
    Ok(location)
}
