//! Database and pool monitor configuration

use crate::connection::{HealthCheckConfig, PoolMonitorConfig, ScalerConfig};
use folio_core::config::env::{get_env_optional, get_env_or_default, get_env_parsed};
use folio_core::{AppConfigTrait, ConfigError, ConfigSource};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POOL_LOG: &str = "logs/pool_manager.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Postgres,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::Memory => "memory",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "memory" | "mem" => Ok(BackendKind::Memory),
            _ => Err(ConfigError::invalid_value("DATABASE_BACKEND", s, "postgres or memory")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: BackendKind,
    pub url: Option<String>,
    pub min_connections: u32,
    /// Physical pool size at startup
    pub max_connections: u32,
    pub max_scalable_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub monitor: PoolMonitorConfig,
}

impl DatabaseConfig {
    /// In-memory backend with an idle monitor configuration
    pub fn memory() -> Self {
        let monitor = PoolMonitorConfig {
            event_log_path: None,
            ..Default::default()
        };
        Self {
            backend: BackendKind::Memory,
            url: None,
            min_connections: monitor.scaler.min_connections,
            max_connections: monitor.scaler.initial_max,
            max_scalable_connections: monitor.scaler.max_scalable,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10),
            monitor,
        }
    }

    /// URL with the password masked, for logging
    pub fn redacted_url(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        match (url.find("://"), url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                let credentials = &url[scheme_end + 3..at];
                let user = credentials.split(':').next().unwrap_or_default();
                Some(format!("{}{}:****{}", &url[..scheme_end + 3], user, &url[at..]))
            }
            _ => Some(url.to_string()),
        }
    }
}

impl AppConfigTrait for DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = BackendKind::from_str(&get_env_or_default("DATABASE_BACKEND", "postgres"))?;
        let url = get_env_optional("DATABASE_URL");

        let min_connections = get_env_parsed("DB_POOL_MIN", 5u32, "positive integer")?;
        let max_connections = get_env_parsed("DB_POOL_MAX", 10u32, "positive integer")?;
        let max_scalable_connections = get_env_parsed("DB_POOL_MAX_SCALABLE", 20u32, "positive integer")?;
        let acquire_timeout = get_env_parsed("DB_ACQUIRE_TIMEOUT_SECS", 30u64, "seconds")?;
        let idle_timeout = get_env_parsed("DB_IDLE_TIMEOUT_SECS", 10u64, "seconds")?;

        let scaler = ScalerConfig {
            min_connections,
            initial_max: max_connections,
            max_scalable: max_scalable_connections,
            scale_up_threshold: get_env_parsed("POOL_SCALE_UP_THRESHOLD", 80u32, "percentage")?,
            scale_down_threshold: get_env_parsed("POOL_SCALE_DOWN_THRESHOLD", 30u32, "percentage")?,
            ..Default::default()
        };

        let event_log_path = match get_env_optional("POOL_LOG_PATH") {
            Some(path) if path.eq_ignore_ascii_case("off") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_POOL_LOG)),
        };

        let monitor = PoolMonitorConfig {
            interval: Duration::from_millis(get_env_parsed("POOL_MONITOR_INTERVAL_MS", 60_000u64, "milliseconds")?),
            health: HealthCheckConfig {
                interval: Duration::from_millis(get_env_parsed("POOL_HEALTH_INTERVAL_MS", 30_000u64, "milliseconds")?),
                ..Default::default()
            },
            scale_every_ticks: get_env_parsed("POOL_SCALE_EVERY_TICKS", 1u64, "tick count")?,
            cleanup_every_ticks: get_env_parsed("POOL_CLEANUP_EVERY_TICKS", 2u64, "tick count")?,
            health_every_ticks: get_env_parsed("POOL_HEALTH_EVERY_TICKS", 10u64, "tick count")?,
            scaler,
            event_log_path,
            ..Default::default()
        };

        Ok(DatabaseConfig {
            backend,
            url,
            min_connections,
            max_connections,
            max_scalable_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout),
            idle_timeout: Duration::from_secs(idle_timeout),
            monitor,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Postgres && self.url.is_none() {
            return Err(ConfigError::missing_env("DATABASE_URL"));
        }
        if let Some(url) = &self.url {
            if self.backend == BackendKind::Postgres
                && !(url.starts_with("postgres://") || url.starts_with("postgresql://"))
            {
                return Err(ConfigError::invalid_value(
                    "DATABASE_URL",
                    self.redacted_url().unwrap_or_default(),
                    "postgres:// or postgresql:// URL",
                ));
            }
        }
        if self.acquire_timeout.is_zero() {
            return Err(ConfigError::validation_failed(
                "DB_ACQUIRE_TIMEOUT_SECS",
                "acquire timeout must be greater than zero",
            ));
        }

        self.monitor
            .validate()
            .map_err(|e| ConfigError::validation_failed("pool", e.to_string()))
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert(
            "backend".to_string(),
            ConfigSource::env_or_default("DATABASE_BACKEND", "postgres"),
        );
        sources.insert(
            "url".to_string(),
            ConfigSource::env_or_default("DATABASE_URL", "none"),
        );
        sources.insert(
            "min_connections".to_string(),
            ConfigSource::env_or_default("DB_POOL_MIN", "5"),
        );
        sources.insert(
            "max_connections".to_string(),
            ConfigSource::env_or_default("DB_POOL_MAX", "10"),
        );
        sources.insert(
            "max_scalable_connections".to_string(),
            ConfigSource::env_or_default("DB_POOL_MAX_SCALABLE", "20"),
        );
        sources.insert(
            "monitor_interval".to_string(),
            ConfigSource::env_or_default("POOL_MONITOR_INTERVAL_MS", "60000"),
        );
        sources.insert("monitor".to_string(), ConfigSource::Nested);
        sources
    }
}
