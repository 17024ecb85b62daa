//! Password hashing

use crate::AuthResult;
use bcrypt::{hash, verify};

/// Cost factor for stored password hashes
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Password hashing abstraction
pub trait PasswordHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> AuthResult<String>;

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool>;

    fn hasher_name(&self) -> &str;
}

/// bcrypt password hasher implementation
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Minimum bcrypt cost, for tests
    pub fn fast() -> Self {
        Self { cost: 4 }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        Ok(hash(password, self.cost)?)
    }

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        Ok(verify(password, hash)?)
    }

    fn hasher_name(&self) -> &str {
        "bcrypt"
    }
}
