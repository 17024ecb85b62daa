pub mod app_config;
pub mod env;
pub mod validation;

pub use app_config::*;
pub use validation::*;

use std::collections::HashMap;

/// Configuration trait implemented by every config section of the application
pub trait AppConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    EnvVar(String),
    Default(String),
    Nested,
}

impl ConfigSource {
    /// Report an env var when it is set, otherwise the default that was used
    pub fn env_or_default(var: &str, default: impl Into<String>) -> Self {
        if env::get_env_optional(var).is_some() {
            ConfigSource::EnvVar(var.to_string())
        } else {
            ConfigSource::Default(default.into())
        }
    }
}
