//! User documents and the payloads that create or change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::credentials::HashedPassword;
use super::ids::{PostId, UserId};
use super::lifecycle::{Role, Status};

/// Normalize an email address for storage and lookup.
///
/// Emails are unique case-insensitively, so every comparison goes through
/// this function.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A stored user document.
///
/// Holds the password hash, so it never leaves the crate boundary as-is:
/// outbound callers get a [`UserView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Document id.
    pub id: UserId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Normalized email (see [`normalize_email`]).
    pub email: String,
    /// Argon2 hash of the password.
    pub password_hash: HashedPassword,
    /// Account role.
    pub role: Role,
    /// Soft-delete state.
    pub status: Status,
    /// Users following this user.
    pub followers: BTreeSet<UserId>,
    /// Users this user follows.
    pub followings: BTreeSet<UserId>,
    /// Posts authored by this user. Denormalized, not authoritative.
    pub posts: BTreeSet<PostId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a freshly registered user.
    ///
    /// Role and status are always the server defaults.
    pub fn registered(
        first_name: String,
        last_name: String,
        email: &str,
        password_hash: HashedPassword,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::generate(),
            first_name,
            last_name,
            email: normalize_email(email),
            password_hash,
            role: Role::default(),
            status: Status::default(),
            followers: BTreeSet::new(),
            followings: BTreeSet::new(),
            posts: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record is visible.
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Identity embedded in issued tokens.
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id,
            role: self.role,
        }
    }

    /// Outbound projection without the password hash.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            role: self.role,
            status: self.status,
            followers: self.followers.clone(),
            followings: self.followings.clone(),
            posts: self.posts.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Subject of a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    /// User id.
    pub id: UserId,
    /// Role at the time of issuance.
    pub role: Role,
}

/// User as returned to callers. Has no password field at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// User id.
    pub id: UserId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Normalized email.
    pub email: String,
    /// Current role.
    pub role: Role,
    /// Lifecycle status.
    pub status: Status,
    /// Users following this one.
    pub followers: BTreeSet<UserId>,
    /// Users this one follows.
    pub followings: BTreeSet<UserId>,
    /// Posts this user has authored.
    pub posts: BTreeSet<PostId>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Registration input.
///
/// Only profile fields exist here. A JSON body that also carries `role`,
/// `status`, `followers` or `followings` deserializes fine; those keys are
/// dropped.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Login email.
    pub email: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
}

impl fmt::Debug for RegistrationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationPayload")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login input.
#[derive(Clone, Deserialize)]
pub struct LoginPayload {
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

impl fmt::Debug for LoginPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPayload")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Partial profile update.
///
/// `role` is honoured for admin actors only; `status` is not editable here
/// (deactivation has its own operation).
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New given name.
    pub first_name: Option<String>,
    /// New family name.
    pub last_name: Option<String>,
    /// New email, normalized before storage.
    pub email: Option<String>,
    /// New plaintext password, rehashed.
    pub password: Option<String>,
    /// New role (admin actors only).
    pub role: Option<Role>,
}

impl UserPatch {
    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
    }
}

impl fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPatch")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("role", &self.role)
            .finish()
    }
}
