//! Structured logging setup
//!
//! `RUST_LOG` wins over the configured level. Each environment gets a
//! preset directive set for the HTTP stack so request traces stay quiet in
//! production.

use folio_core::{Environment, LoggingConfig};
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Unknown names fall back to compact
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Filter directives for `level` in `environment`
pub fn filter_directives(level: &str, environment: Environment) -> String {
    let stack = match environment {
        Environment::Production => "tower_http=warn,axum=warn,sqlx=warn",
        Environment::Development => "tower_http=debug,axum=info,sqlx=warn",
        Environment::Testing => "tower_http=error,axum=error,sqlx=error",
    };
    format!("{},{}", level, stack)
}

/// Install the global subscriber
pub fn init_logging(
    config: &LoggingConfig,
    environment: Environment,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directives = filter_directives(&config.level, environment);
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directives))?;

    match LogFormat::parse(&config.format) {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).pretty().with_file(true).with_line_number(true))
            .try_init()?,
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).compact().with_target(true))
            .try_init()?,
    }

    tracing::debug!(level = %config.level, format = %config.format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Compact);
    }

    #[test]
    fn test_production_directives_quiet_the_stack() {
        let directives = filter_directives("info", Environment::Production);
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("tower_http=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
