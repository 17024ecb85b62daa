//! Shared application state handed to every handler

use crate::config::HttpConfig;
use crate::error::{HttpError, HttpResult};
use crate::monitor::ServiceMonitor;
use axum::extract::FromRef;
use folio_auth::{JwtConfig, JwtService, PasswordHasher};
use folio_core::{AlertLog, AppConfig};
use folio_orm::{Database, PoolMonitor};
use folio_storage::{UploadConfig, UploadGate};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<AppConfig>,
    pub http: Arc<HttpConfig>,
    pub uploads: Arc<UploadConfig>,
    pub db: Database,
    pub jwt: Arc<JwtService>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub gate: UploadGate,
    pub alerts: AlertLog,
    pub service_monitor: Arc<ServiceMonitor>,
    /// Present when the backend owns a connection pool
    pub pool_monitor: Option<Arc<PoolMonitor>>,
}

impl AppState {
    /// Wire the shared services together. The pool monitor is attached
    /// separately once the database is connected.
    pub fn new(
        app: AppConfig,
        http: HttpConfig,
        uploads: UploadConfig,
        db: Database,
        jwt: &JwtConfig,
        hasher: Arc<dyn PasswordHasher>,
        alerts: AlertLog,
    ) -> HttpResult<Self> {
        let service_monitor = ServiceMonitor::new(http.service_monitor.clone(), self_url(&app), alerts.clone())
            .map_err(|e| HttpError::internal(format!("Failed to build the service monitor client: {}", e)))?;

        Ok(Self {
            gate: UploadGate::new(uploads.max_concurrent),
            app: Arc::new(app),
            http: Arc::new(http),
            uploads: Arc::new(uploads),
            db,
            jwt: Arc::new(JwtService::new(jwt)),
            hasher,
            alerts,
            service_monitor: Arc::new(service_monitor),
            pool_monitor: None,
        })
    }

    pub fn with_pool_monitor(mut self, monitor: Arc<PoolMonitor>) -> Self {
        self.pool_monitor = Some(monitor);
        self
    }
}

/// Address the server can reach itself on
fn self_url(app: &AppConfig) -> String {
    let host = match app.server.host.as_str() {
        "0.0.0.0" | "::" | "" => "127.0.0.1",
        host => host,
    };
    format!("http://{}:{}", host, app.server.port)
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AlertLog {
    fn from_ref(state: &AppState) -> Self {
        state.alerts.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.app.environment)
            .field("db", &self.db)
            .field("upload_dir", &self.uploads.upload_dir)
            .field("pool_monitor", &self.pool_monitor.is_some())
            .finish()
    }
}
