//! Error taxonomy shared by every core operation.
//!
//! The core never logs failures; it returns a [`CoreError`] and the transport
//! decides how to log it and which status code to send.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::graph::EdgeRepair;
use crate::store::StoreError;

/// Result alias used across the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failure category of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input.
    InvalidInput,
    /// Missing, invalid or expired credential.
    Unauthenticated,
    /// Authenticated but not the owner and not an admin.
    Forbidden,
    /// Resource missing or inactive.
    NotFound,
    /// Uniqueness violation or repeated terminal transition.
    Conflict,
    /// Well-formed request that makes no sense (self-follow).
    InvalidOperation,
    /// A two-document operation applied only one side.
    PartialFailure,
    /// Store or crypto primitive failure.
    InternalError,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidOperation => "invalid_operation",
            Self::PartialFailure => "partial_failure",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned by every core operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input failed a boundary check.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Credential missing, malformed, expired or not ours.
    ///
    /// The message never says which check failed.
    #[error("{0}")]
    Unauthenticated(String),

    /// Actor is not allowed to perform the mutation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource missing or inactive.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness violation or repeated terminal transition.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation rejected on its own terms.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// One side of a follow edge was written, the other was not.
    #[error("Partial failure: {message}")]
    PartialFailure {
        /// What happened.
        message: String,
        /// The pending idempotent update that completes the edge.
        repair: EdgeRepair,
    },

    /// Store or crypto failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::PartialFailure { .. } => ErrorKind::PartialFailure,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Generic authentication failure that does not reveal which check failed.
    pub fn bad_credentials() -> Self {
        Self::Unauthenticated("Invalid email or password".to_string())
    }

    /// Generic token failure.
    pub fn bad_token() -> Self {
        Self::Unauthenticated("Invalid or expired token".to_string())
    }

    /// Create an internal error from any error type.
    pub fn internal<E: std::error::Error>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateKey(field) => Self::Conflict(format!("{field} already exists")),
            StoreError::Backend(message) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_duplicate_maps_to_conflict() {
        let err: CoreError = StoreError::DuplicateKey("email".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "Conflict: email already exists");
    }

    #[test]
    fn test_store_backend_maps_to_internal() {
        let err: CoreError = StoreError::Backend("connection reset".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InternalError);
    }

    #[test]
    fn test_bad_credentials_is_generic() {
        let err = CoreError::bad_credentials();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        assert!(!err.to_string().to_lowercase().contains("not found"));
    }

    #[test]
    fn test_kind_codes_are_snake_case() {
        assert_eq!(ErrorKind::PartialFailure.code(), "partial_failure");
        let json = serde_json::to_string(&ErrorKind::InvalidOperation).unwrap();
        assert_eq!(json, "\"invalid_operation\"");
    }
}
