//! Authenticated callers and login sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::BearerToken;
use super::ids::UserId;
use super::lifecycle::Role;
use super::user::UserView;

/// The caller of a core operation, resolved from a verified bearer token.
///
/// Only [`crate::credentials::CredentialManager::verify_token`] produces one
/// outside of tests; the role is the one the token was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthenticatedActor {
    /// Id of the acting user.
    pub id: UserId,
    /// Role of the acting user.
    pub role: Role,
}

impl AuthenticatedActor {
    /// Create an actor.
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether the actor is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Result of a successful registration or login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The authenticated user.
    pub user: UserView,
    /// Signed bearer token.
    pub token: BearerToken,
    /// When the token stops verifying.
    pub expires_at: DateTime<Utc>,
}
