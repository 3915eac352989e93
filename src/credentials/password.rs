//! Salted password hashing with Argon2id.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use std::fmt;

use crate::config::PasswordParams;
use crate::error::{CoreError, CoreResult};

/// A password hash in PHC string format (`$argon2id$v=19$...`).
///
/// The salt and cost parameters travel inside the string, so a hash stays
/// verifiable after the configured cost changes.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Wrap a PHC string loaded from storage.
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// The PHC string, for storage.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(<redacted>)")
    }
}

/// Argon2id hasher with fixed cost parameters.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Build a hasher. Fails if argon2 rejects the parameters.
    pub fn new(params: PasswordParams) -> CoreResult<Self> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| CoreError::Internal(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> CoreResult<HashedPassword> {
        if password.is_empty() {
            return Err(CoreError::InvalidInput("password must not be empty".to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| HashedPassword(hash.to_string()))
            .map_err(|e| CoreError::Internal(format!("password hashing failed: {e}")))
    }

    /// Check a password against a stored hash.
    ///
    /// Returns `false` on mismatch and on a corrupt stored hash; the
    /// comparison itself is constant-time inside argon2.
    pub fn verify(&self, password: &str, hash: &HashedPassword) -> bool {
        match PasswordHash::new(hash.as_str()) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
