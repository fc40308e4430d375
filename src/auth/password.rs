//! Password hashing seam and its Argon2id implementation.

use anyhow::{anyhow, Result};
use argon2::password_hash::{
    PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, PasswordHash, Version};
use rand::rngs::OsRng;

pub trait PasswordHasher: Send + Sync {
    /// Hash a raw password into a PHC string for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    fn hash(&self, password: &str) -> Result<String>;

    /// Check a raw password against a stored hash.
    ///
    /// # Errors
    ///
    /// Returns an error only on malformed hashes or hasher failure; a
    /// mismatching password is `Ok(false)`.
    fn matches(&self, password: &str, hash: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Default)]
pub struct Argon2PasswordHasher;

impl Argon2PasswordHasher {
    fn argon2() -> Result<Argon2<'static>> {
        let params = Params::new(
            32_768, // 32 MB
            3,      // iterations
            1,      // parallelism
            None,
        )
        .map_err(|e| anyhow!("failed to create Argon2 params: {e}"))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Self::argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?
            .to_string();
        Ok(hash)
    }

    fn matches(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| anyhow!("invalid password hash format: {e}"))?;

        match Self::argon2()?.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("password verification failed: {e}")),
        }
    }
}
