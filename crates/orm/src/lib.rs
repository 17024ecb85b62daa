//! # folio-orm: persistence layer for the folio portfolio CMS
//!
//! Entity models and validation, repository traits with PostgreSQL and
//! in-memory backends, and connection pool monitoring.

pub mod backends;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod repository;

pub use config::{BackendKind, DatabaseConfig};
pub use connection::{PoolMonitor, PoolMonitorConfig, PoolStatus};
pub use error::{OrmError, OrmResult};
pub use models::*;
pub use repository::{ArticleRepository, Database, DatabaseBackend, ProductRepository, UserRepository};
