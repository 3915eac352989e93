//! Token verification modes.
//!
//! ## Purpose
//!
//! Every authenticated request verifies its bearer token. HMAC-SHA256 is
//! cheap, but a busy service sees the same token many times per minute, so
//! signature results can be memoized in an LRU cache.
//!
//! ## Verification Modes
//!
//! | Mode | Use Case | Notes |
//! |------|----------|-------|
//! | `LocalSecret` | Tests, low traffic | Full HMAC every time |
//! | `Cached` | Services | HMAC once per token, LRU afterwards |
//!
//! ## Expiry
//!
//! The cache only remembers whether a token's *signature* is valid and what
//! it claims. Expiry is re-checked against the caller's clock on every call,
//! cache hit or not.

use lru::LruCache;
use parking_lot::RwLock;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Arc;
use xxhash_rust::xxh64::Xxh64;

use super::token::{BearerToken, TokenClaims};

/// Configuration for the token verification cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }
}

/// Verification mode for bearer tokens.
#[derive(Debug, Clone)]
pub enum VerificationMode {
    /// Verify using the local HMAC secret on every call.
    LocalSecret {
        /// The token signing secret.
        secret: Vec<u8>,
    },

    /// Verify with LRU caching of signature checks.
    Cached {
        /// The token signing secret.
        secret: Vec<u8>,
        /// Cache configuration.
        config: CacheConfig,
    },
}

impl VerificationMode {
    /// Create a local secret verification mode.
    pub fn local_secret(secret: Vec<u8>) -> Self {
        Self::LocalSecret { secret }
    }

    /// Create a cached verification mode with default configuration.
    pub fn cached(secret: Vec<u8>) -> Self {
        Self::Cached {
            secret,
            config: CacheConfig::default(),
        }
    }

    /// Create a cached verification mode with custom configuration.
    pub fn cached_with_config(secret: Vec<u8>, config: CacheConfig) -> Self {
        Self::Cached { secret, config }
    }
}

/// Cache key: xxHash64 of the raw token string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VerificationCacheKey(u64);

impl VerificationCacheKey {
    fn compute(token: &BearerToken) -> Self {
        let mut hasher = Xxh64::new(0);
        hasher.write(token.as_str().as_bytes());
        Self(hasher.finish())
    }
}

/// Cached outcome of a signature check.
///
/// The full token is kept so a 64-bit key collision can never hand one
/// token's claims to another.
#[derive(Debug, Clone)]
struct CachedVerification {
    token: String,
    claims: Option<TokenClaims>,
}

/// Compare two byte strings without early exit on the first difference.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Result of a verification.
#[derive(Debug, Clone, Copy)]
pub struct VerificationResult {
    /// Claims of a correctly signed, unexpired token.
    pub claims: Option<TokenClaims>,
    /// Whether the signature check came from cache.
    pub cache_hit: bool,
}

impl VerificationResult {
    /// Whether the token is valid.
    pub fn is_valid(&self) -> bool {
        self.claims.is_some()
    }
}

/// Token verifier with optional caching.
///
/// Thread-safe and suitable for use in async services.
pub struct TokenVerifier {
    mode: VerificationMode,
    cache: Option<Arc<RwLock<LruCache<VerificationCacheKey, CachedVerification>>>>,
}

impl TokenVerifier {
    /// Create a new token verifier with the specified mode.
    pub fn new(mode: VerificationMode) -> Self {
        let cache = match &mode {
            VerificationMode::Cached { config, .. } if config.enabled => {
                NonZeroUsize::new(config.max_entries)
                    .map(|size| Arc::new(RwLock::new(LruCache::new(size))))
            }
            _ => None,
        };

        Self { mode, cache }
    }

    /// Get the HMAC secret from the verification mode.
    fn secret(&self) -> &[u8] {
        match &self.mode {
            VerificationMode::LocalSecret { secret } => secret,
            VerificationMode::Cached { secret, .. } => secret,
        }
    }

    /// Verify a token at `now` (unix seconds).
    pub fn verify_at(&self, token: &BearerToken, now: i64) -> VerificationResult {
        let (claims, cache_hit) = self.check_signature(token);
        VerificationResult {
            claims: claims.filter(|c| !c.is_expired_at(now)),
            cache_hit,
        }
    }

    /// Signature check, through the cache when enabled.
    fn check_signature(&self, token: &BearerToken) -> (Option<TokenClaims>, bool) {
        let cache_key = VerificationCacheKey::compute(token);

        if let Some(cache) = &self.cache {
            // Try read lock first (non-blocking for other readers)
            if let Some(entry) = cache.read().peek(&cache_key) {
                if constant_time_eq(entry.token.as_bytes(), token.as_str().as_bytes()) {
                    return (entry.claims, true);
                }
            }
        }

        let claims = TokenClaims::verify_signature(token, self.secret());

        if let Some(cache) = &self.cache {
            cache.write().put(
                cache_key,
                CachedVerification {
                    token: token.as_str().to_string(),
                    claims,
                },
            );
        }

        (claims, false)
    }

    /// Get cache statistics.
    ///
    /// Returns `None` if caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
            }
        })
    }

    /// Clear the verification cache.
    ///
    /// Does nothing if caching is disabled.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, UserId};
    use uuid::Uuid;

    const SECRET: &[u8] = b"test_kernel_secret_32_bytes_min!";
    const NOW: i64 = 1_700_000_000;

    fn make_token(secret: &[u8], expires_at: i64) -> BearerToken {
        TokenClaims {
            subject: UserId::new(Uuid::from_u128(1)),
            role: Role::User,
            expires_at,
        }
        .sign(secret)
        .unwrap()
    }

    #[test]
    fn test_local_verification() {
        let verifier = TokenVerifier::new(VerificationMode::local_secret(SECRET.to_vec()));
        let token = make_token(SECRET, NOW + 60);

        let result = verifier.verify_at(&token, NOW);
        assert!(result.is_valid());
        assert!(!result.cache_hit); // No cache in local mode
        assert!(verifier.cache_stats().is_none());
    }

    #[test]
    fn test_cached_verification_hit() {
        let verifier = TokenVerifier::new(VerificationMode::cached(SECRET.to_vec()));
        let token = make_token(SECRET, NOW + 60);

        let first = verifier.verify_at(&token, NOW);
        assert!(first.is_valid());
        assert!(!first.cache_hit);

        let second = verifier.verify_at(&token, NOW);
        assert!(second.is_valid());
        assert!(second.cache_hit);
        assert_eq!(verifier.cache_stats().unwrap().len, 1);
    }

    #[test]
    fn test_cached_token_still_expires() {
        let verifier = TokenVerifier::new(VerificationMode::cached(SECRET.to_vec()));
        let token = make_token(SECRET, NOW + 60);

        assert!(verifier.verify_at(&token, NOW).is_valid());

        let later = verifier.verify_at(&token, NOW + 61);
        assert!(later.cache_hit);
        assert!(!later.is_valid());
    }

    #[test]
    fn test_verification_failure_wrong_secret() {
        let token = make_token(b"correct_secret_32_bytes_minimum!", NOW + 60);
        let verifier =
            TokenVerifier::new(VerificationMode::local_secret(b"wrong_secret_totally_different!!".to_vec()));
        assert!(!verifier.verify_at(&token, NOW).is_valid());
    }

    #[test]
    fn test_invalid_token_cached() {
        let verifier = TokenVerifier::new(VerificationMode::cached(SECRET.to_vec()));
        let token = make_token(b"some_other_signing_secret_______", NOW + 60);

        let first = verifier.verify_at(&token, NOW);
        assert!(!first.is_valid());
        assert!(!first.cache_hit);

        let second = verifier.verify_at(&token, NOW);
        assert!(!second.is_valid());
        assert!(second.cache_hit); // Invalid results are also cached
    }

    #[test]
    fn test_cache_clear() {
        let verifier = TokenVerifier::new(VerificationMode::cached(SECRET.to_vec()));
        let token = make_token(SECRET, NOW + 60);

        verifier.verify_at(&token, NOW);
        assert_eq!(verifier.cache_stats().unwrap().len, 1);

        verifier.clear_cache();
        assert_eq!(verifier.cache_stats().unwrap().len, 0);
        assert!(!verifier.verify_at(&token, NOW).cache_hit);
    }

    #[test]
    fn test_custom_cache_config() {
        let config = CacheConfig {
            max_entries: 5,
            enabled: true,
        };
        let verifier = TokenVerifier::new(VerificationMode::cached_with_config(SECRET.to_vec(), config));
        assert_eq!(verifier.cache_stats().unwrap().cap, 5);
    }

    #[test]
    fn test_cache_disabled() {
        let config = CacheConfig {
            max_entries: 100,
            enabled: false,
        };
        let verifier = TokenVerifier::new(VerificationMode::cached_with_config(SECRET.to_vec(), config));
        assert!(verifier.cache_stats().is_none());

        let result = verifier.verify_at(&make_token(SECRET, NOW + 60), NOW);
        assert!(result.is_valid());
        assert!(!result.cache_hit);
    }

    #[test]
    fn test_cache_key_uniqueness() {
        let a = make_token(SECRET, NOW + 60);
        let b = make_token(SECRET, NOW + 61);
        assert_ne!(VerificationCacheKey::compute(&a), VerificationCacheKey::compute(&b));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
