//! JWT issuing and verification (HS256)

use crate::config::JwtConfig;
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Utc};
use folio_orm::{Role, User};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const DEFAULT_TOKEN_PREFIX: &str = "Bearer ";

/// Claims carried by every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expires_in: Duration,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            expires_in: config.expires_in,
        }
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    pub fn issue(&self, user: &User) -> AuthResult<String> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token as if it were `now`
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> AuthResult<String> {
        let lifetime = chrono::Duration::from_std(self.expires_in)
            .map_err(|e| AuthError::config_error(format!("token lifetime out of range: {}", e)))?;

        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Check signature and expiry and return the claims
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("algorithm", &"HS256")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// A missing header or an empty token is `Ok(None)`; any other scheme is an error.
pub fn extract_token(header: Option<&str>) -> AuthResult<Option<String>> {
    let Some(value) = header else {
        return Ok(None);
    };

    let token = value
        .strip_prefix(DEFAULT_TOKEN_PREFIX)
        .ok_or_else(|| AuthError::invalid_token(format!("Token must start with '{}'", DEFAULT_TOKEN_PREFIX)))?
        .trim();

    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 7,
            username: "alice".into(),
            password_hash: String::new(),
            email: "alice@example.com".into(),
            role,
            status: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = JwtService::new(&JwtConfig::for_testing());
        let token = service.issue(&user(Role::Admin)).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.id, 7);
        assert_eq!(claims.username, "alice");
        assert!(claims.is_admin());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = JwtService::new(&JwtConfig::for_testing());
        let issued = Utc::now() - chrono::Duration::days(2);
        let token = service.issue_at(&user(Role::Editor), issued).unwrap();

        assert_eq!(service.verify(&token).unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let ours = JwtService::new(&JwtConfig::for_testing());
        let theirs = JwtService::new(&JwtConfig::new("another-secret-entirely", Duration::from_secs(60)));
        let token = theirs.issue(&user(Role::Admin)).unwrap();

        assert!(matches!(ours.verify(&token), Err(AuthError::InvalidToken { .. })));
        assert!(ours.verify("not.a.token").is_err());
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token(None).unwrap(), None);
        assert_eq!(extract_token(Some("Bearer abc")).unwrap(), Some("abc".to_string()));
        assert_eq!(extract_token(Some("Bearer   ")).unwrap(), None);
        assert!(extract_token(Some("Basic abc")).is_err());
    }
}
