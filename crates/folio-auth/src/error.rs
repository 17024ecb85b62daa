//! Authentication and authorization error types

use folio_core::ConfigError;
use thiserror::Error;

/// Authentication and authorization errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token on a protected request
    #[error("Access denied. No token provided")]
    MissingToken,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User account is disabled")]
    UserDisabled,

    /// Authenticated but not allowed
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Authentication configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Cryptographic error: {message}")]
    CryptographicError { message: String },
}

impl AuthError {
    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken { .. } => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UserDisabled => "USER_DISABLED",
            AuthError::AccessDenied { .. } => "ACCESS_DENIED",
            AuthError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AuthError::CryptographicError { .. } => "CRYPTOGRAPHIC_ERROR",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken { .. }
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => 401,
            AuthError::UserDisabled | AuthError::AccessDenied { .. } => 403,
            AuthError::ConfigurationError { .. } | AuthError::CryptographicError { .. } => 500,
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn crypto_error(message: impl Into<String>) -> Self {
        Self::CryptographicError {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::invalid_token(err.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::crypto_error(err.to_string())
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::config_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::MissingToken.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::access_denied("admins only").status_code(), 403);
        assert_eq!(AuthError::UserDisabled.status_code(), 403);
        assert_eq!(AuthError::crypto_error("boom").status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::invalid_token("bad").error_code(), "INVALID_TOKEN");
        assert_eq!(AuthError::InvalidCredentials.error_code(), "INVALID_CREDENTIALS");
    }
}
