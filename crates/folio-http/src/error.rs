//! HTTP error type and the JSON error envelope
//!
//! Every handler returns [`HttpResult`]. Errors from the persistence, auth
//! and upload crates convert into [`HttpError`] with `?` and keep their own
//! status and error code.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_auth::AuthError;
use folio_orm::OrmError;
use folio_storage::StorageError;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Result type for HTTP handlers
pub type HttpResult<T> = Result<T, HttpError>;

static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Include internal error messages in 500 responses (development only)
pub fn expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    ServiceUnavailable { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },

    #[error("Server startup failed: {message}")]
    StartupFailed { message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Orm(#[from] OrmError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

impl HttpError {
    pub fn bad_request<T: Into<String>>(message: T) -> Self {
        HttpError::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found<T: Into<String>>(message: T) -> Self {
        HttpError::NotFound {
            message: message.into(),
        }
    }

    pub fn unavailable<T: Into<String>>(message: T) -> Self {
        HttpError::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn internal<T: Into<String>>(message: T) -> Self {
        HttpError::InternalError {
            message: message.into(),
        }
    }

    pub fn startup<T: Into<String>>(message: T) -> Self {
        HttpError::StartupFailed {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::BadRequest { .. } | HttpError::Multipart(_) => StatusCode::BAD_REQUEST,
            HttpError::NotFound { .. } => StatusCode::NOT_FOUND,
            HttpError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::InternalError { .. } | HttpError::StartupFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Auth(e) => status_from_u16(e.status_code()),
            HttpError::Storage(e) => status_from_u16(e.status_code()),
            HttpError::Orm(e) => match e {
                OrmError::Validation(_) | OrmError::Conflict(_) => StatusCode::BAD_REQUEST,
                OrmError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            HttpError::BadRequest { .. } => "BAD_REQUEST",
            HttpError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            HttpError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            HttpError::InternalError { .. } => "INTERNAL_ERROR",
            HttpError::StartupFailed { .. } => "SERVER_STARTUP_FAILED",
            HttpError::Multipart(_) => "INVALID_MULTIPART",
            HttpError::Auth(e) => e.error_code(),
            HttpError::Orm(e) => e.error_code(),
            HttpError::Storage(e) => e.error_code(),
        }
    }

    /// Get error hint for user guidance
    pub fn error_hint(&self) -> Option<&'static str> {
        match self {
            HttpError::BadRequest { .. } | HttpError::Multipart(_) => Some("Check request format and parameters"),
            HttpError::ServiceUnavailable { .. } => Some("Server may be starting up or experiencing issues"),
            HttpError::Auth(AuthError::MissingToken) => Some("Send an 'Authorization: Bearer <token>' header"),
            HttpError::Auth(AuthError::TokenExpired) => Some("Log in again to obtain a new token"),
            HttpError::Storage(StorageError::TooManyUploads) => Some("Retry the upload shortly"),
            HttpError::Storage(StorageError::Timeout) => Some("Upload fewer or smaller files"),
            HttpError::Storage(StorageError::FileTooLarge(..)) => Some("Reduce the file size"),
            _ => None,
        }
    }

    /// Message shown to clients; server-side failures are elided unless exposed
    fn public_message(&self) -> String {
        if self.status_code().is_server_error()
            && !matches!(self, HttpError::ServiceUnavailable { .. })
            && !EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed)
        {
            return "Internal server error".to_string();
        }
        self.to_string()
    }
}

fn status_from_u16(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "Request failed: {}", self);
        } else {
            tracing::debug!(code = self.error_code(), status = status.as_u16(), "Request rejected: {}", self);
        }

        let body = json!({
            "success": false,
            "message": self.public_message(),
            "error": {
                "code": self.error_code(),
                "hint": self.error_hint()
            }
        });

        (status, Json(body)).into_response()
    }
}
