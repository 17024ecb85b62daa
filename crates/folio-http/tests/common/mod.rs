//! Shared router test harness

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use bytes::Bytes;
use folio_auth::{BcryptHasher, JwtConfig, PasswordHasher};
use folio_core::{AlertLog, AppConfig};
use folio_http::{build_router, AppState, HttpConfig};
use folio_orm::{Database, NewUser, Role, User};
use folio_storage::UploadConfig;
use futures::stream::{self, StreamExt};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "folio-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub uploads: TempDir,
    pub public: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_uploads(|config| config)
    }

    /// App whose upload settings are adjusted by `configure`
    pub fn with_uploads(configure: impl FnOnce(UploadConfig) -> UploadConfig) -> Self {
        let uploads = TempDir::new().unwrap();
        let public = TempDir::new().unwrap();
        std::fs::write(public.path().join("index.html"), "<h1>folio</h1>").unwrap();

        let http = HttpConfig {
            public_dir: public.path().to_path_buf(),
            ..HttpConfig::default()
        };
        let upload_config = configure(UploadConfig::default().with_upload_dir(uploads.path()));
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::fast());

        let state = AppState::new(
            AppConfig::for_testing(),
            http,
            upload_config,
            Database::memory(),
            &JwtConfig::for_testing(),
            hasher,
            AlertLog::in_memory(),
        )
        .unwrap();

        Self {
            router: build_router(state.clone()),
            state,
            uploads,
            public,
        }
    }

    pub async fn create_user(&self, username: &str, password: &str, role: Role, status: bool) -> User {
        let password_hash = self.state.hasher.hash_password(password).unwrap();
        self.state
            .db
            .users
            .create(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash,
                role,
                status,
            })
            .await
            .unwrap()
    }

    pub async fn token_for(&self, username: &str, role: Role) -> String {
        let user = self.create_user(username, "secret123", role, true).await;
        self.state.jwt.issue(&user).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn upload_count(&self) -> usize {
        file_count(self.uploads.path())
    }
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// One part of a multipart form
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn image<'a>(field: &'a str, file_name: &'a str) -> Part<'a> {
    Part::File {
        field,
        file_name,
        content_type: "image/png",
        data: b"\x89PNG\r\n\x1a\nnot-really-a-png",
    }
}

fn encode_part(body: &mut Vec<u8>, part: &Part<'_>) {
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    match part {
        Part::Text(name, value) => {
            body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
            body.extend_from_slice(value.as_bytes());
        }
        Part::File {
            field,
            file_name,
            content_type,
            data,
        } => {
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    field, file_name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
        }
    }
    body.extend_from_slice(b"\r\n");
}

fn multipart_builder(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
}

pub fn multipart_request(method: &str, uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        encode_part(&mut body, part);
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    multipart_builder(method, uri, token).body(Body::from(body)).unwrap()
}

/// Multipart request whose body sends `parts`, opens one more text field and
/// then never finishes, like a client that stalls mid-upload.
pub fn stalled_multipart_request(method: &str, uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        encode_part(&mut body, part);
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\npartial",
            BOUNDARY
        )
        .as_bytes(),
    );

    let stream = stream::iter([Ok::<_, std::io::Error>(Bytes::from(body))]).chain(stream::pending());
    multipart_builder(method, uri, token)
        .body(Body::from_stream(stream))
        .unwrap()
}
