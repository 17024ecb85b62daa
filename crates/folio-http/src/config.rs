//! HTTP server configuration
//!
//! Static file location, request body limits, the service self-monitor and
//! the default admin account created on first start.

use folio_core::config::env::{get_env_bool, get_env_or_default, get_env_parsed};
use folio_core::{AppConfigTrait, ConfigError, ConfigSource};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// HTTP server specific configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Directory holding the static frontend
    pub public_dir: PathBuf,
    /// Limit for JSON and form bodies
    pub max_body_size: usize,
    pub service_monitor: ServiceMonitorConfig,
    pub seed: SeedConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("./public"),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            service_monitor: ServiceMonitorConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

/// Periodic self-check of the running server
#[derive(Debug, Clone)]
pub struct ServiceMonitorConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Per-request timeout for health checks and stress test requests
    pub timeout: Duration,
    /// Consecutive failures before an alert
    pub alert_threshold: u32,
    pub alert_cooldown: Duration,
    /// Responses slower than this are logged as slow
    pub slow_response: Duration,
    pub health_path: String,
}

impl Default for ServiceMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
            alert_threshold: 3,
            alert_cooldown: Duration::from_secs(300),
            slow_response: Duration::from_millis(2000),
            health_path: "/health".to_string(),
        }
    }
}

/// Admin account created when no admin exists
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin123".to_string(),
            email: "admin@example.com".to_string(),
        }
    }
}

impl AppConfigTrait for HttpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = ServiceMonitorConfig::default();
        let service_monitor = ServiceMonitorConfig {
            enabled: get_env_bool("SERVICE_MONITOR_ENABLED", true)?,
            interval: Duration::from_millis(get_env_parsed(
                "SERVICE_MONITOR_INTERVAL_MS",
                60_000u64,
                "milliseconds",
            )?),
            timeout: Duration::from_millis(get_env_parsed("SERVICE_MONITOR_TIMEOUT_MS", 10_000u64, "milliseconds")?),
            alert_threshold: get_env_parsed("SERVICE_MONITOR_ALERT_THRESHOLD", 3u32, "positive integer")?,
            ..defaults
        };

        let seed = SeedConfig {
            username: get_env_or_default("ADMIN_USERNAME", "admin"),
            password: get_env_or_default("ADMIN_PASSWORD", "admin123"),
            email: get_env_or_default("ADMIN_EMAIL", "admin@example.com"),
        };

        Ok(HttpConfig {
            public_dir: PathBuf::from(get_env_or_default("PUBLIC_DIR", "./public")),
            max_body_size: get_env_parsed("MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE, "size in bytes")?,
            service_monitor,
            seed,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_size == 0 {
            return Err(ConfigError::validation_failed(
                "MAX_BODY_SIZE",
                "Maximum request size must be greater than 0",
            ));
        }

        let monitor = &self.service_monitor;
        if monitor.interval.is_zero() || monitor.timeout.is_zero() {
            return Err(ConfigError::validation_failed(
                "SERVICE_MONITOR_INTERVAL_MS",
                "Service monitor interval and timeout must be greater than 0",
            ));
        }
        if monitor.alert_threshold == 0 {
            return Err(ConfigError::validation_failed(
                "SERVICE_MONITOR_ALERT_THRESHOLD",
                "Alert threshold must be at least 1",
            ));
        }
        if !monitor.health_path.starts_with('/') {
            return Err(ConfigError::validation_failed(
                "health_path",
                "Health check path must start with '/'",
            ));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert("public_dir".to_string(), ConfigSource::env_or_default("PUBLIC_DIR", "./public"));
        sources.insert(
            "max_body_size".to_string(),
            ConfigSource::env_or_default("MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE.to_string()),
        );
        sources.insert(
            "service_monitor.enabled".to_string(),
            ConfigSource::env_or_default("SERVICE_MONITOR_ENABLED", "true"),
        );
        sources.insert(
            "service_monitor.interval".to_string(),
            ConfigSource::env_or_default("SERVICE_MONITOR_INTERVAL_MS", "60000"),
        );
        sources.insert(
            "service_monitor.timeout".to_string(),
            ConfigSource::env_or_default("SERVICE_MONITOR_TIMEOUT_MS", "10000"),
        );
        sources.insert(
            "service_monitor.alert_threshold".to_string(),
            ConfigSource::env_or_default("SERVICE_MONITOR_ALERT_THRESHOLD", "3"),
        );
        sources.insert("seed.username".to_string(), ConfigSource::env_or_default("ADMIN_USERNAME", "admin"));
        sources.insert(
            "seed.email".to_string(),
            ConfigSource::env_or_default("ADMIN_EMAIL", "admin@example.com"),
        );
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_service_monitor_from_env() {
        env::set_var("SERVICE_MONITOR_ENABLED", "false");
        env::set_var("SERVICE_MONITOR_TIMEOUT_MS", "2500");
        env::set_var("ADMIN_USERNAME", "owner");

        let config = HttpConfig::from_env().unwrap();
        assert!(!config.service_monitor.enabled);
        assert_eq!(config.service_monitor.timeout, Duration::from_millis(2500));
        assert_eq!(config.service_monitor.interval, Duration::from_secs(60));
        assert_eq!(config.seed.username, "owner");
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);

        for var in ["SERVICE_MONITOR_ENABLED", "SERVICE_MONITOR_TIMEOUT_MS", "ADMIN_USERNAME"] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_invalid_body_size_is_reported() {
        env::set_var("MAX_BODY_SIZE", "lots");
        let result = HttpConfig::from_env();
        env::remove_var("MAX_BODY_SIZE");

        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_validate() {
        assert!(HttpConfig::default().validate().is_ok());

        let mut config = HttpConfig::default();
        config.service_monitor.alert_threshold = 0;
        assert!(config.validate().is_err());
    }
}
