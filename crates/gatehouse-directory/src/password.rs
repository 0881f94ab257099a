//! Password hashing capability

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::{GatewayError, Result};

/// Hashes and verifies passwords
pub trait PasswordEncryption: Send + Sync {
    /// Hash `password` with a freshly generated salt
    fn hash(&self, password: &str) -> Result<String>;

    /// Whether `password` matches a hash produced by [`hash`](Self::hash)
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id password hashing producing PHC strings
#[derive(Clone)]
pub struct Argon2PasswordEncryption {
    argon2: Argon2<'static>,
}

impl Argon2PasswordEncryption {
    /// Argon2id with the crate's recommended parameters
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Argon2id with explicit memory (KiB) and iteration costs
    pub fn with_params(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| GatewayError::invalid(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2PasswordEncryption {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordEncryption for Argon2PasswordEncryption {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| GatewayError::internal(format!("Password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| {
                GatewayError::internal(format!("Stored password hash is malformed: {}", e))
            })?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
