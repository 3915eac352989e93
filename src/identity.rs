//! Identity store: registration, login and profile management.
//!
//! Owns user documents. Passwords are hashed here, at the call site, before
//! anything reaches the store.

use chrono::Utc;
use std::sync::Arc;

use crate::credentials::CredentialManager;
use crate::error::{CoreError, CoreResult};
use crate::policy::{decide, decide_admin, decide_role_change};
use crate::store::{StoreError, UserFilter, UserStore, UserUpdate};
use crate::types::{
    normalize_email, AuthenticatedActor, RegistrationPayload, Session, Status, User, UserId,
    UserPatch, UserView,
};

/// Reject blank values of required text fields.
fn require_text(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Registration, login and self-service profile operations.
pub struct IdentityStore<S> {
    store: Arc<S>,
    credentials: Arc<CredentialManager>,
}

impl<S: UserStore> IdentityStore<S> {
    /// Create an identity store.
    pub fn new(store: Arc<S>, credentials: Arc<CredentialManager>) -> Self {
        Self { store, credentials }
    }

    /// Create an account and sign the new user in.
    ///
    /// `Conflict` if the email is taken, compared case-insensitively.
    pub async fn register(&self, payload: RegistrationPayload) -> CoreResult<Session> {
        require_text("firstName", &payload.first_name)?;
        require_text("lastName", &payload.last_name)?;
        require_text("email", &payload.email)?;

        let email = normalize_email(&payload.email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(CoreError::Conflict("email already exists".to_string()));
        }

        let password_hash = self.credentials.hash_password(&payload.password)?;
        let user = User::registered(
            payload.first_name.trim().to_string(),
            payload.last_name.trim().to_string(),
            &email,
            password_hash,
            Utc::now(),
        );

        // The pre-check above races with concurrent registrations; the store's
        // unique index has the final word.
        let user = self.store.insert_user(user).await.map_err(|e| match e {
            StoreError::DuplicateKey(_) => CoreError::Conflict("email already exists".to_string()),
            other => other.into(),
        })?;

        tracing::debug!(user_id = %user.id, "user registered");
        self.session_for(&user)
    }

    /// Exchange an email and password for a session.
    ///
    /// Unknown email, inactive account and wrong password all fail with the
    /// same `Unauthenticated` error and cost one password verification.
    pub async fn login(&self, email: &str, password: &str) -> CoreResult<Session> {
        let user = match self.store.find_user_by_email(&normalize_email(email)).await? {
            Some(user) if user.is_active() => user,
            _ => {
                self.credentials.verify_decoy(password);
                return Err(CoreError::bad_credentials());
            }
        };

        if !self.credentials.verify_password(password, &user.password_hash) {
            return Err(CoreError::bad_credentials());
        }

        tracing::debug!(user_id = %user.id, "user logged in");
        self.session_for(&user)
    }

    fn session_for(&self, user: &User) -> CoreResult<Session> {
        let issued = self.credentials.issue_token(&user.identity())?;
        Ok(Session {
            user: user.view(),
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Every active user. Admin only.
    pub async fn fetch_active_all(&self, actor: &AuthenticatedActor) -> CoreResult<Vec<UserView>> {
        decide_admin(actor).require("only admins may list users")?;
        let users = self.store.list_users(Status::Active).await?;
        Ok(users.iter().map(User::view).collect())
    }

    /// The caller's own profile. `NotFound` once deactivated.
    pub async fn fetch_self(&self, actor_id: UserId) -> CoreResult<UserView> {
        self.store
            .find_user(actor_id)
            .await?
            .filter(User::is_active)
            .map(|u| u.view())
            .ok_or_else(|| CoreError::NotFound("User".to_string()))
    }

    /// Any user by id, whatever its status.
    pub async fn find(&self, id: UserId) -> CoreResult<UserView> {
        self.store
            .find_user(id)
            .await?
            .map(|u| u.view())
            .ok_or_else(|| CoreError::NotFound("User".to_string()))
    }

    /// Apply a profile patch to `target` on behalf of `actor`.
    pub async fn edit(
        &self,
        target: UserId,
        actor: &AuthenticatedActor,
        patch: UserPatch,
    ) -> CoreResult<UserView> {
        decide(actor, target).require("you can only edit your own profile")?;
        if patch.role.is_some() {
            decide_role_change(actor).require("only admins may change roles")?;
        }
        if patch.is_empty() {
            return Err(CoreError::InvalidInput("nothing to update".to_string()));
        }

        let updates = self.updates_for(patch)?;
        let updated = self
            .store
            .update_user(UserFilter::active(target), &updates, Utc::now())
            .await?
            .ok_or_else(|| CoreError::NotFound("User".to_string()))?;

        tracing::debug!(user_id = %target, actor = %actor.id, fields = updates.len(), "user edited");
        Ok(updated.view())
    }

    fn updates_for(&self, patch: UserPatch) -> CoreResult<Vec<UserUpdate>> {
        let mut updates = Vec::new();
        if let Some(first_name) = patch.first_name {
            require_text("firstName", &first_name)?;
            updates.push(UserUpdate::SetFirstName(first_name.trim().to_string()));
        }
        if let Some(last_name) = patch.last_name {
            require_text("lastName", &last_name)?;
            updates.push(UserUpdate::SetLastName(last_name.trim().to_string()));
        }
        if let Some(email) = patch.email {
            require_text("email", &email)?;
            updates.push(UserUpdate::SetEmail(normalize_email(&email)));
        }
        if let Some(password) = patch.password {
            updates.push(UserUpdate::SetPasswordHash(self.credentials.hash_password(&password)?));
        }
        if let Some(role) = patch.role {
            updates.push(UserUpdate::SetRole(role));
        }
        Ok(updates)
    }

    /// Soft-delete `target` on behalf of `actor`.
    ///
    /// `Conflict` if the account is already inactive.
    pub async fn deactivate(&self, target: UserId, actor: &AuthenticatedActor) -> CoreResult<UserView> {
        decide(actor, target).require("you can only remove your own account")?;

        let deactivated = self
            .store
            .update_user(UserFilter::active(target), &[UserUpdate::SetStatus(Status::Inactive)], Utc::now())
            .await?;

        match deactivated {
            Some(user) => {
                tracing::debug!(user_id = %target, actor = %actor.id, "user deactivated");
                Ok(user.view())
            }
            None => match self.store.find_user(target).await? {
                Some(_) => Err(CoreError::Conflict("user is already inactive".to_string())),
                None => Err(CoreError::NotFound("User".to_string())),
            },
        }
    }
}
