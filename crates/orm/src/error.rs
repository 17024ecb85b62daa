//! Error types for the persistence layer

use crate::connection::PoolError;
use folio_core::ConfigError;
use thiserror::Error;

/// Result type alias for repository operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Errors raised by repositories and backends
#[derive(Debug, Error)]
pub enum OrmError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found in table '{0}'")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrmError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrmError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        OrmError::Conflict(message.into())
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            OrmError::Database(_) => "DATABASE_ERROR",
            OrmError::NotFound(_) => "RESOURCE_NOT_FOUND",
            OrmError::Validation(_) => "VALIDATION_ERROR",
            OrmError::Conflict(_) => "RESOURCE_CONFLICT",
            OrmError::Connection(_) => "DATABASE_CONNECTION_ERROR",
            OrmError::Configuration(_) => "CONFIGURATION_ERROR",
            OrmError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => OrmError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                OrmError::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                OrmError::Conflict(unique_violation_message(db_err.constraint()))
            }
            other => OrmError::Database(other.to_string()),
        }
    }
}

fn unique_violation_message(constraint: Option<&str>) -> String {
    match constraint {
        Some(c) if c.contains("username") => "Username already exists".to_string(),
        Some(c) if c.contains("email") => "Email already exists".to_string(),
        _ => "Record already exists".to_string(),
    }
}

impl From<PoolError> for OrmError {
    fn from(err: PoolError) -> Self {
        OrmError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

impl From<ConfigError> for OrmError {
    fn from(err: ConfigError) -> Self {
        OrmError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_messages() {
        assert_eq!(unique_violation_message(Some("users_username_key")), "Username already exists");
        assert_eq!(unique_violation_message(Some("users_email_key")), "Email already exists");
        assert_eq!(unique_violation_message(None), "Record already exists");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OrmError::validation("bad").error_code(), "VALIDATION_ERROR");
        assert_eq!(OrmError::NotFound("users".into()).error_code(), "RESOURCE_NOT_FOUND");
        assert_eq!(OrmError::conflict("dup").to_string(), "dup");
    }
}
