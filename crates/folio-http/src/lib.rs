//! # folio-http
//!
//! HTTP surface of the folio portfolio CMS built on axum: JSON routes for
//! users, products and articles, multipart uploads, health and monitoring
//! endpoints, the static frontend and the service self-monitor.

pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod monitor;
pub mod multipart;
pub mod response;
pub mod routes;
pub mod seed;
pub mod server;
pub mod state;

pub use config::{HttpConfig, SeedConfig, ServiceMonitorConfig};
pub use error::{expose_internal_errors, HttpError, HttpResult};
pub use extract::{AdminUser, AuthUser, JsonBody};
pub use logging::init_logging;
pub use monitor::{ServiceMonitor, ServiceStatus, StressTestReport};
pub use response::ApiResponse;
pub use seed::ensure_default_admin;
pub use server::{build_router, serve, serve_on};
pub use state::AppState;
