//! # folio-auth: authentication for the folio portfolio CMS
//!
//! HS256 access tokens, bcrypt password hashing and bearer-token extraction.

pub mod config;
pub mod error;
pub mod jwt;
pub mod password;

pub use config::JwtConfig;
pub use error::AuthError;
pub use jwt::{extract_token, Claims, JwtService};
pub use password::{BcryptHasher, PasswordHasher};

/// Authentication result type alias
pub type AuthResult<T> = Result<T, AuthError>;
