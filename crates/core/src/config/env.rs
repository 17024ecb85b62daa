//! Helpers for reading typed values out of the process environment.

use super::ConfigError;
use std::env;
use std::str::FromStr;

pub fn get_env_required(key: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::missing_env(key)),
    }
}

pub fn get_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_env_or_default(key: &str, default: &str) -> String {
    get_env_optional(key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable into `T`, falling back to `default` when it is unset.
pub fn get_env_parsed<T: FromStr>(key: &str, default: T, expected: &str) -> Result<T, ConfigError> {
    match get_env_optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::invalid_value(key, raw, expected)),
        None => Ok(default),
    }
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`.
pub fn get_env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match get_env_optional(key) {
        Some(raw) => parse_bool(&raw)
            .ok_or_else(|| ConfigError::invalid_value(key, raw, "true or false")),
        None => Ok(default),
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
