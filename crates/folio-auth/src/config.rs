//! Authentication configuration

use folio_core::config::env::{get_env_optional, get_env_or_default};
use folio_core::{AppConfigTrait, ConfigError, ConfigSource, Environment};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Signing secret used outside production when `JWT_SECRET` is unset
const DEVELOPMENT_SECRET: &str = "folio-development-secret-change-me";
const DEFAULT_EXPIRES_IN: &str = "24h";
const MIN_SECRET_LENGTH: usize = 16;

/// JWT token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing secret
    pub secret: String,
    pub expires_in: Duration,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            secret: secret.into(),
            expires_in,
        }
    }

    pub fn for_testing() -> Self {
        Self::new("folio-test-secret-0123456789", Duration::from_secs(3600))
    }
}

impl AppConfigTrait for JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_str(&get_env_or_default("APP_ENV", "development"))?;

        let secret = match get_env_optional("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => return Err(ConfigError::missing_env("JWT_SECRET")),
            None => {
                tracing::warn!("JWT_SECRET is not set, using the development secret");
                DEVELOPMENT_SECRET.to_string()
            }
        };

        let raw_expiry = get_env_or_default("JWT_EXPIRES_IN", DEFAULT_EXPIRES_IN);
        let expires_in = parse_duration(&raw_expiry).ok_or_else(|| {
            ConfigError::invalid_value("JWT_EXPIRES_IN", raw_expiry, "seconds or a number with s, m, h or d")
        })?;

        Ok(JwtConfig { secret, expires_in })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::validation_failed(
                "JWT_SECRET",
                format!("secret must be at least {} characters", MIN_SECRET_LENGTH),
            ));
        }
        if self.expires_in.is_zero() {
            return Err(ConfigError::validation_failed("JWT_EXPIRES_IN", "expiry must be positive"));
        }
        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert(
            "secret".to_string(),
            ConfigSource::env_or_default("JWT_SECRET", "development secret"),
        );
        sources.insert(
            "expires_in".to_string(),
            ConfigSource::env_or_default("JWT_EXPIRES_IN", DEFAULT_EXPIRES_IN),
        );
        sources
    }
}

/// Parse `3600`, `30s`, `15m`, `24h` or `7d`
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.char_indices().last()? {
        (i, 's') => (&raw[..i], 1),
        (i, 'm') => (&raw[..i], 60),
        (i, 'h') => (&raw[..i], 3600),
        (i, 'd') => (&raw[..i], 86_400),
        _ => (raw, 1),
    };

    let value: u64 = digits.trim().parse().ok()?;
    value.checked_mul(multiplier).map(Duration::from_secs)
}
