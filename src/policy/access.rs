//! Ownership decisions.
//!
//! Pure functions of the actor and the resource owner. Every mutating path in
//! the identity, graph and content modules goes through one of these; none of
//! them compares ids inline.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{AuthenticatedActor, UserId};

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The actor may proceed.
    Allow,
    /// The actor may not proceed.
    Deny,
}

impl Decision {
    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny
        }
    }

    /// Whether the decision allows the operation.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Turn a `Deny` into `Forbidden` with the given reason.
    pub fn require(self, reason: &str) -> CoreResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny => Err(CoreError::Forbidden(reason.to_string())),
        }
    }
}

/// May `actor` mutate a resource owned by `owner`?
///
/// Allow iff the actor is the owner or an admin.
pub fn decide(actor: &AuthenticatedActor, owner: UserId) -> Decision {
    Decision::from_bool(actor.id == owner || actor.is_admin())
}

/// May `actor` create a resource in the name of `claimed_author`?
///
/// Allow iff they are the same user. Admins get no exception: nobody authors
/// on another's behalf.
pub fn decide_authorship(actor: &AuthenticatedActor, claimed_author: UserId) -> Decision {
    Decision::from_bool(actor.id == claimed_author)
}

/// May `actor` use an admin-only operation?
pub fn decide_admin(actor: &AuthenticatedActor) -> Decision {
    Decision::from_bool(actor.is_admin())
}

/// May `actor` change a user's role?
pub fn decide_role_change(actor: &AuthenticatedActor) -> Decision {
    decide_admin(actor)
}
