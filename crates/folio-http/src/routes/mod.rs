//! Route tables
//!
//! Health and connectivity endpoints sit at the root; everything else is
//! nested under `/api`.

pub mod articles;
pub mod editor;
pub mod health;
pub mod products;
pub mod users;

use crate::error::{HttpError, HttpResult};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use folio_orm::{Page, Pagination};
use folio_storage::UploadConfig;
use serde::Serialize;
use std::sync::Arc;

/// Largest file count any route accepts (product cover plus gallery)
const MAX_FILES_PER_REQUEST: u64 = 21;
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// `/api` routes
pub fn api_router(state: &AppState) -> Router<AppState> {
    let upload_limit = DefaultBodyLimit::max(upload_body_limit(&state.uploads));

    Router::new()
        .nest("/users", users::router())
        .nest("/products", products::router().layer(upload_limit))
        .nest("/articles", articles::router().layer(upload_limit))
        .nest("/editor", editor::router().layer(upload_limit))
        .merge(health::api_router())
        .fallback(api_not_found)
}

/// Body limit for multipart routes
pub fn upload_body_limit(config: &UploadConfig) -> usize {
    let limit = config.max_file_size.saturating_mul(MAX_FILES_PER_REQUEST) + MULTIPART_OVERHEAD;
    usize::try_from(limit).unwrap_or(usize::MAX)
}

async fn api_not_found() -> HttpError {
    HttpError::not_found("The requested resource does not exist")
}

/// Clamp user supplied paging values
pub(crate) fn pagination(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Pagination {
    Pagination::new(page.unwrap_or(1), limit.unwrap_or(default_limit).min(100))
}

/// `pagination` block of public list responses
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageInfo {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl PageInfo {
    pub fn of<T>(page: &Page<T>) -> Self {
        Self {
            total: page.total,
            page: page.page,
            limit: page.limit,
            pages: page.pages(),
        }
    }
}

/// Hash on the blocking pool; bcrypt is deliberately slow
pub(crate) async fn hash_password(state: &AppState, password: String) -> HttpResult<String> {
    let hasher = Arc::clone(&state.hasher);
    tokio::task::spawn_blocking(move || hasher.hash_password(&password))
        .await
        .map_err(|e| HttpError::internal(format!("Password hashing task failed: {}", e)))?
        .map_err(HttpError::from)
}

pub(crate) async fn verify_password(state: &AppState, password: String, hash: String) -> HttpResult<bool> {
    let hasher = Arc::clone(&state.hasher);
    tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
        .await
        .map_err(|e| HttpError::internal(format!("Password verification task failed: {}", e)))?
        .map_err(HttpError::from)
}

/// Parse `true`/`false` query values the way the frontend sends them
pub(crate) fn query_flag(raw: Option<&str>) -> Option<bool> {
    raw.map(|value| value.eq_ignore_ascii_case("true") || value == "1")
}
