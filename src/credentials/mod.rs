//! Credential manager: password hashing and bearer token issuance.
//!
//! Stateless apart from the signature cache. Nothing here touches a store.

pub mod password;
pub mod token;
pub mod verification;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config::CredentialConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{AuthenticatedActor, UserIdentity};

pub use password::{Argon2Hasher, HashedPassword};
pub use token::{BearerToken, TokenClaims};
pub use verification::{CacheConfig, CacheStats, TokenVerifier, VerificationMode, VerificationResult};

/// Password verified against when a login names an unknown email, so that
/// "no such user" costs the same as "wrong password".
const DECOY_PASSWORD: &str = "decoy-password-never-matches";

/// Accepted token lifetimes, in seconds: one second to one year.
const TOKEN_TTL_RANGE: std::ops::RangeInclusive<i64> = 1..=365 * 24 * 60 * 60;

/// A freshly issued token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The bearer token.
    pub token: BearerToken,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

/// Owns password hashing/verification and token issuance/validation.
pub struct CredentialManager {
    hasher: Argon2Hasher,
    verifier: TokenVerifier,
    signing_secret: Vec<u8>,
    token_ttl: Duration,
    decoy: HashedPassword,
}

impl CredentialManager {
    /// Create a credential manager.
    ///
    /// Hashes the decoy password once, so construction costs one Argon2 run.
    /// `InvalidInput` if the token lifetime is outside one second to one year.
    pub fn new(config: &CredentialConfig) -> CoreResult<Self> {
        let token_ttl = Some(config.token_ttl_secs)
            .filter(|secs| TOKEN_TTL_RANGE.contains(secs))
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "token lifetime must be between {} and {} seconds, got {}",
                    TOKEN_TTL_RANGE.start(),
                    TOKEN_TTL_RANGE.end(),
                    config.token_ttl_secs
                ))
            })?;

        let hasher = Argon2Hasher::new(config.password)?;
        let decoy = hasher.hash(DECOY_PASSWORD)?;

        let mode = if config.token_cache_size == 0 {
            VerificationMode::local_secret(config.token_secret.clone())
        } else {
            VerificationMode::cached_with_config(
                config.token_secret.clone(),
                CacheConfig {
                    max_entries: config.token_cache_size,
                    enabled: true,
                },
            )
        };

        Ok(Self {
            hasher,
            verifier: TokenVerifier::new(mode),
            signing_secret: config.token_secret.clone(),
            token_ttl,
            decoy,
        })
    }

    /// One-way salted hash. `InvalidInput` on an empty password.
    pub fn hash_password(&self, password: &str) -> CoreResult<HashedPassword> {
        self.hasher.hash(password)
    }

    /// Check a password. Never errors; a mismatch is `false`.
    pub fn verify_password(&self, password: &str, hash: &HashedPassword) -> bool {
        self.hasher.verify(password, hash)
    }

    /// Spend one verification on the decoy hash and discard the result.
    pub fn verify_decoy(&self, password: &str) {
        let _ = self.hasher.verify(password, &self.decoy);
    }

    /// Issue a token valid from now for the configured lifetime.
    pub fn issue_token(&self, subject: &UserIdentity) -> CoreResult<IssuedToken> {
        self.issue_token_at(subject, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_token_at(&self, subject: &UserIdentity, now: DateTime<Utc>) -> CoreResult<IssuedToken> {
        let expires_at = now
            .checked_add_signed(self.token_ttl)
            .ok_or_else(|| CoreError::Internal("token expiry out of range".to_string()))?;
        let claims = TokenClaims {
            subject: subject.id,
            role: subject.role,
            expires_at: expires_at.timestamp(),
        };

        let token = claims.sign(&self.signing_secret)?;
        tracing::trace!(subject = %subject.id, role = %subject.role, "token issued");

        Ok(IssuedToken {
            token,
            // Round-trip through unix seconds so the reported expiry matches the token.
            expires_at: Utc
                .timestamp_opt(claims.expires_at, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Resolve the actor behind a token.
    ///
    /// `Unauthenticated` on expired, malformed or unverifiable tokens.
    pub fn verify_token(&self, token: &BearerToken) -> CoreResult<AuthenticatedActor> {
        self.verify_token_at(token, Utc::now())
    }

    /// Resolve the actor behind a token as if the current time were `now`.
    pub fn verify_token_at(&self, token: &BearerToken, now: DateTime<Utc>) -> CoreResult<AuthenticatedActor> {
        let result = self.verifier.verify_at(token, now.timestamp());
        result
            .claims
            .map(|claims| AuthenticatedActor::new(claims.subject, claims.role))
            .ok_or_else(CoreError::bad_token)
    }

    /// The underlying verifier, for cache statistics.
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }
}
