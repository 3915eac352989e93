//! Signed, time-bounded bearer tokens.
//!
//! ## Format
//!
//! ```text
//! v1.<user-id>.<role>.<expires-unix-seconds>.<hex(HMAC-SHA256(secret, "v1.<user-id>.<role>.<expires>"))>
//! ```
//!
//! Tokens are verified, never looked up: everything needed to resolve the
//! actor is inside the token, and the signature proves the kernel issued it.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{Role, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Opaque bearer credential handed to clients.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    /// Create a token from a string (for verification).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the token as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the unsigned prefix is printed.
        let prefix = self.0.rsplit_once('.').map(|(signed, _)| signed).unwrap_or("<malformed>");
        write!(f, "BearerToken({prefix}.<sig>)")
    }
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenClaims {
    /// Subject user id.
    pub subject: UserId,
    /// Subject role at issuance.
    pub role: Role,
    /// Expiry as unix seconds.
    pub expires_at: i64,
}

impl TokenClaims {
    /// Token version marker for canonical representation.
    const TOKEN_VERSION: &'static str = "v1";

    /// Build the canonical signed part of the token.
    fn canonical_string(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            Self::TOKEN_VERSION,
            self.subject,
            self.role.as_str(),
            self.expires_at,
        )
    }

    /// Sign the claims.
    ///
    /// Fails with `Internal` when no signing key is configured.
    pub fn sign(&self, secret: &[u8]) -> CoreResult<BearerToken> {
        if secret.is_empty() {
            return Err(CoreError::Internal("token signing key unavailable".to_string()));
        }

        let canonical = self.canonical_string();
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CoreError::Internal(format!("token signing failed: {e}")))?;
        mac.update(canonical.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(BearerToken(format!("{canonical}.{signature}")))
    }

    /// Parse and authenticate a token against `secret`.
    ///
    /// Returns `None` for malformed tokens and bad signatures alike. Expiry is
    /// not checked here.
    pub fn verify_signature(token: &BearerToken, secret: &[u8]) -> Option<Self> {
        if secret.is_empty() {
            return None;
        }

        let (signed, signature_hex) = token.as_str().rsplit_once('.')?;
        let claims = Self::parse_signed(signed)?;
        let signature = hex::decode(signature_hex).ok()?;

        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(signed.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&signature).ok()?;

        Some(claims)
    }

    /// Parse the unsigned `v1.<id>.<role>.<exp>` part.
    fn parse_signed(signed: &str) -> Option<Self> {
        let mut parts = signed.split('.');
        let version = parts.next()?;
        let subject = parts.next()?;
        let role = parts.next()?;
        let expires_at = parts.next()?;
        if parts.next().is_some() || version != Self::TOKEN_VERSION {
            return None;
        }

        Some(Self {
            subject: UserId::parse_str(subject).ok()?,
            role: Role::from_str(role)?,
            expires_at: expires_at.parse().ok()?,
        })
    }

    /// Whether the token is expired at `now` (unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
