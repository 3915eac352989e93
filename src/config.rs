//! Kernel configuration.
//!
//! All settings can be configured via environment variables:
//! - `AUTH_TOKEN_SECRET`: HMAC secret for bearer tokens (required in production)
//! - `AUTH_TOKEN_TTL_SECS`: Token lifetime, 1s to one year (default: 86400)
//! - `AUTH_TOKEN_CACHE_SIZE`: Verified-signature cache size, 0 disables (default: 10000)
//! - `PASSWORD_MEMORY_KIB`: Argon2 memory cost (default: 19456)
//! - `PASSWORD_ITERATIONS`: Argon2 time cost (default: 2)
//! - `PASSWORD_PARALLELISM`: Argon2 lanes (default: 1)
//! - `FOLLOW_REPAIR_ATTEMPTS`: Immediate retries of the reciprocal follow write (default: 2)
//! - `CONCEAL_FORBIDDEN`: Report ownership failures as 404 (default: false)
//! - `REPAIR_INTERVAL_SECS`: Period of the background follow-edge reconciler (default: 30)

use std::str::FromStr;

/// Development-only signing secret used when `AUTH_TOKEN_SECRET` is unset.
const DEVELOPMENT_SECRET: &[u8] = b"development_only_secret_not_for_production";

/// Read and parse an environment variable, falling back to `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl PasswordParams {
    /// Cheapest parameters argon2 accepts. For tests and benchmarks only.
    pub fn low_cost() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Load parameters from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memory_kib: env_or("PASSWORD_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("PASSWORD_ITERATIONS", defaults.iterations),
            parallelism: env_or("PASSWORD_PARALLELISM", defaults.parallelism),
        }
    }
}

impl Default for PasswordParams {
    /// OWASP-recommended Argon2id baseline (19 MiB, 2 passes, 1 lane).
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Settings of the credential manager.
#[derive(Clone)]
pub struct CredentialConfig {
    /// HMAC secret for signing bearer tokens. Empty means "no signing key".
    pub token_secret: Vec<u8>,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: i64,
    /// Capacity of the verified-signature cache. 0 disables caching.
    pub token_cache_size: usize,
    /// Password hashing cost.
    pub password: PasswordParams,
}

impl CredentialConfig {
    /// Create a configuration with a secret and default everything else.
    pub fn new(token_secret: Vec<u8>) -> Self {
        Self {
            token_secret,
            token_ttl_secs: 86_400,
            token_cache_size: 10_000,
            password: PasswordParams::default(),
        }
    }

    /// Override the password hashing cost.
    pub fn with_password_params(mut self, password: PasswordParams) -> Self {
        self.password = password;
        self
    }

    /// Override the token lifetime.
    pub fn with_token_ttl_secs(mut self, secs: i64) -> Self {
        self.token_ttl_secs = secs;
        self
    }

    /// Override the cache capacity.
    pub fn with_token_cache_size(mut self, size: usize) -> Self {
        self.token_cache_size = size;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Falls back to a development secret if `AUTH_TOKEN_SECRET` is not set.
    pub fn from_env() -> Self {
        let token_secret = match std::env::var("AUTH_TOKEN_SECRET") {
            Ok(s) if !s.is_empty() => s.into_bytes(),
            _ => {
                tracing::warn!(
                    "AUTH_TOKEN_SECRET not set, using development secret. \
                     Set this for production!"
                );
                DEVELOPMENT_SECRET.to_vec()
            }
        };

        Self {
            token_secret,
            token_ttl_secs: env_or("AUTH_TOKEN_TTL_SECS", 86_400),
            token_cache_size: env_or("AUTH_TOKEN_CACHE_SIZE", 10_000),
            password: PasswordParams::from_env(),
        }
    }
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("token_secret", &format_args!("<{} bytes>", self.token_secret.len()))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("token_cache_size", &self.token_cache_size)
            .field("password", &self.password)
            .finish()
    }
}

/// Top-level kernel configuration.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Credential manager settings.
    pub credentials: CredentialConfig,
    /// Immediate retries of the reciprocal side of a follow edge.
    pub repair_attempts: u32,
    /// Report `Forbidden` as not-found to avoid leaking existence.
    pub conceal_forbidden: bool,
    /// Period of the background reconciler in seconds.
    pub repair_interval_secs: u64,
}

impl KernelConfig {
    /// Create a configuration around credential settings.
    pub fn new(credentials: CredentialConfig) -> Self {
        Self {
            credentials,
            repair_attempts: 2,
            conceal_forbidden: false,
            repair_interval_secs: 30,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            credentials: CredentialConfig::from_env(),
            repair_attempts: env_or("FOLLOW_REPAIR_ATTEMPTS", 2),
            conceal_forbidden: env_or("CONCEAL_FORBIDDEN", false),
            repair_interval_secs: env_or("REPAIR_INTERVAL_SECS", 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secret() {
        let config = CredentialConfig::new(b"super_secret_value".to_vec());
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super_secret_value"));
        assert!(printed.contains("<18 bytes>"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = CredentialConfig::new(b"k".to_vec())
            .with_token_ttl_secs(60)
            .with_token_cache_size(0)
            .with_password_params(PasswordParams::low_cost());
        assert_eq!(config.token_ttl_secs, 60);
        assert_eq!(config.token_cache_size, 0);
        assert_eq!(config.password.memory_kib, 8);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("AUTHORSHIP_KERNEL_TEST_NUMBER", "not-a-number");
        assert_eq!(env_or("AUTHORSHIP_KERNEL_TEST_NUMBER", 5u32), 5);
        std::env::set_var("AUTHORSHIP_KERNEL_TEST_NUMBER", " 9 ");
        assert_eq!(env_or("AUTHORSHIP_KERNEL_TEST_NUMBER", 5u32), 9);
        std::env::remove_var("AUTHORSHIP_KERNEL_TEST_NUMBER");
    }
}
