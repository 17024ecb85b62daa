//! Foundation crate for the folio portfolio CMS: environment configuration
//! and the shared alert log.

pub mod alerts;
pub mod config;

pub use alerts::{AlertLog, AlertRecord};
pub use config::{
    AppConfig, AppConfigTrait, ConfigError, ConfigSource, Environment, LoggingConfig, ServerConfig,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
