use super::env::{get_env_optional, get_env_or_default, get_env_parsed};
use super::{AppConfigTrait, ConfigError, ConfigSource};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_ALERT_LOG: &str = "logs/alerts.log";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-wide configuration shared by every crate
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// `None` keeps alerts in memory only
    pub alert_log_path: Option<PathBuf>,
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Log level and output format
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl AppConfig {
    /// Configuration used by unit and router tests
    pub fn for_testing() -> Self {
        Self {
            name: "folio-test".to_string(),
            environment: Environment::Testing,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            logging: LoggingConfig {
                level: "error".to_string(),
                format: "compact".to_string(),
            },
            alert_log_path: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}

impl AppConfigTrait for AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let name = get_env_or_default("APP_NAME", "folio");
        let environment = Environment::from_str(&get_env_or_default("APP_ENV", "development"))?;

        let alert_log_path = match get_env_optional("ALERT_LOG_PATH") {
            Some(path) if path.eq_ignore_ascii_case("off") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_ALERT_LOG)),
        };

        Ok(AppConfig {
            name,
            environment,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            alert_log_path,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation_failed("name", "App name cannot be empty"));
        }

        self.server.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert("name".to_string(), ConfigSource::env_or_default("APP_NAME", "folio"));
        sources.insert(
            "environment".to_string(),
            ConfigSource::env_or_default("APP_ENV", "development"),
        );
        sources.insert(
            "alert_log_path".to_string(),
            ConfigSource::env_or_default("ALERT_LOG_PATH", DEFAULT_ALERT_LOG),
        );
        sources.insert("server".to_string(), ConfigSource::Nested);
        sources.insert("logging".to_string(), ConfigSource::Nested);
        sources
    }
}

impl AppConfigTrait for ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let host = get_env_or_default("SERVER_HOST", "0.0.0.0");
        let port = get_env_parsed("PORT", 3000u16, "valid port number (1-65535)")?;

        Ok(ServerConfig { host, port })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::validation_failed("host", "Host cannot be empty"));
        }

        if self.port == 0 {
            return Err(ConfigError::validation_failed("port", "Port cannot be 0"));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert("host".to_string(), ConfigSource::env_or_default("SERVER_HOST", "0.0.0.0"));
        sources.insert("port".to_string(), ConfigSource::env_or_default("PORT", "3000"));
        sources
    }
}

impl AppConfigTrait for LoggingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: get_env_or_default("LOG_LEVEL", "info"),
            format: get_env_or_default("LOG_FORMAT", "compact"),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "level",
                self.level.clone(),
                "trace, debug, info, warn, or error",
            ));
        }

        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "format",
                self.format.clone(),
                "compact, pretty, or json",
            ));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert("level".to_string(), ConfigSource::env_or_default("LOG_LEVEL", "info"));
        sources.insert("format".to_string(), ConfigSource::env_or_default("LOG_FORMAT", "compact"));
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_test_env() {
        for key in [
            "APP_NAME",
            "APP_ENV",
            "ALERT_LOG_PATH",
            "SERVER_HOST",
            "PORT",
            "LOG_LEVEL",
            "LOG_FORMAT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_app_config_defaults() {
        clean_test_env();

        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.name, "folio");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.alert_log_path, Some(PathBuf::from("logs/alerts.log")));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_app_config_from_env() {
        clean_test_env();
        env::set_var("APP_NAME", "portfolio");
        env::set_var("APP_ENV", "prod");
        env::set_var("PORT", "8080");
        env::set_var("LOG_FORMAT", "json");
        env::set_var("ALERT_LOG_PATH", "off");

        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.name, "portfolio");
        assert!(config.is_production());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, "json");
        assert!(config.alert_log_path.is_none());

        let sources = config.config_sources();
        assert_eq!(sources.get("name"), Some(&ConfigSource::EnvVar("APP_NAME".to_string())));

        clean_test_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_rejected() {
        clean_test_env();
        env::set_var("PORT", "not-a-port");

        let err = ServerConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        clean_test_env();
    }

    #[test]
    fn test_logging_validation() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            format: "compact".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("TEST".parse::<Environment>().unwrap(), Environment::Testing);
        assert_eq!(Environment::Production.to_string(), "production");
        assert!("staging".parse::<Environment>().is_err());
    }
}
