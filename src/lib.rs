//! # authorship-kernel
//!
//! Identity, ownership enforcement and follow-graph maintenance for a
//! content backend.
//!
//! The kernel answers one question on every write:
//!
//! > Is this actor allowed to change this record, and did the change land
//! > on every document it touches?
//!
//! ## Core Contract
//!
//! 1. Credentials: passwords are stored as Argon2id hashes, sessions are
//!    signed bearer tokens that are verified, never looked up
//! 2. Ownership: a user or post is mutated only by its owner or an admin,
//!    decided in one place ([`policy`])
//! 3. Follow graph: edges are set-like on both sides, never self-referential,
//!    and a half-written edge is reported and repaired
//!
//! ## Architecture
//!
//! ```text
//! Bearer token → CredentialManager → AuthenticatedActor
//!                                          ↓
//!            IdentityStore / RelationshipGraph / ContentStore ← policy::decide
//!                                          ↓
//!                     UserStore + PostStore (Postgres or Memory)
//! ```
//!
//! ## Deletion
//!
//! Nothing is hard-deleted. Users and posts move to `inactive` and drop out
//! of every active listing and lookup.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod config;
pub mod credentials;
pub mod policy;
pub mod store;
pub mod identity;
pub mod graph;
pub mod content;
pub mod kernel;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    AuthenticatedActor, Post, PostDraft, PostId, PostPatch, RegistrationPayload, Role, Session,
    Status, User, UserId, UserPatch, UserView,
};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use config::{CredentialConfig, KernelConfig, PasswordParams};
pub use credentials::{BearerToken, CredentialManager, TokenVerifier, VerificationMode, VerificationResult, CacheConfig, CacheStats};
pub use policy::{decide, Decision};
pub use store::{InMemoryStore, PostStore, StoreError, UserStore};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresStore};
pub use identity::IdentityStore;
pub use graph::{EdgeChange, EdgeRepair, ReconcileReport, RelationshipGraph};
pub use content::ContentStore;
pub use kernel::Kernel;

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

