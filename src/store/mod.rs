//! Document store backends.
//!
//! The kernel needs very little from persistence: documents addressed by a
//! unique id, a unique email, a title that is unique among active posts, and
//! an atomic *conditional* single-document update. Every write in the kernel
//! is one [`UserStore::update_user`] or [`PostStore::update_post`] call whose
//! filter either matches and applies all updates, or does not match and
//! applies none.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credentials::HashedPassword;
use crate::types::{Post, PostId, Role, Status, User, UserId};

/// Error type for store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the field name.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    /// Backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a backend error from any error type.
    pub fn backend<E: std::error::Error>(e: E) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Selects the user document an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFilter {
    /// Document id.
    pub id: UserId,
    /// Required current status, if any.
    pub status: Option<Status>,
}

impl UserFilter {
    /// Match by id only.
    pub fn id(id: UserId) -> Self {
        Self { id, status: None }
    }

    /// Match by id, and only while the user is active.
    pub fn active(id: UserId) -> Self {
        Self {
            id,
            status: Some(Status::Active),
        }
    }

    /// Whether `user` satisfies the filter.
    pub fn matches(&self, user: &User) -> bool {
        user.id == self.id && self.status.map_or(true, |s| user.status == s)
    }
}

/// One field-level change to a user document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserUpdate {
    /// Set the given name.
    SetFirstName(String),
    /// Set the family name.
    SetLastName(String),
    /// Set the (already normalized) email.
    SetEmail(String),
    /// Replace the password hash.
    SetPasswordHash(HashedPassword),
    /// Change the role.
    SetRole(Role),
    /// Change the status.
    SetStatus(Status),
    /// Set-union a follower.
    AddFollower(UserId),
    /// Set-difference a follower.
    RemoveFollower(UserId),
    /// Set-union a followed user.
    AddFollowing(UserId),
    /// Set-difference a followed user.
    RemoveFollowing(UserId),
    /// Record an authored post.
    AddPost(PostId),
}

impl UserUpdate {
    /// Apply the change to an in-memory document.
    ///
    /// Adding a user to its own follow sets is a no-op, so the self-follow
    /// invariant holds even if a caller gets it wrong.
    pub fn apply(&self, user: &mut User) {
        match self {
            Self::SetFirstName(v) => user.first_name = v.clone(),
            Self::SetLastName(v) => user.last_name = v.clone(),
            Self::SetEmail(v) => user.email = v.clone(),
            Self::SetPasswordHash(v) => user.password_hash = v.clone(),
            Self::SetRole(v) => user.role = *v,
            Self::SetStatus(v) => user.status = *v,
            Self::AddFollower(id) => {
                if *id != user.id {
                    user.followers.insert(*id);
                }
            }
            Self::RemoveFollower(id) => {
                user.followers.remove(id);
            }
            Self::AddFollowing(id) => {
                if *id != user.id {
                    user.followings.insert(*id);
                }
            }
            Self::RemoveFollowing(id) => {
                user.followings.remove(id);
            }
            Self::AddPost(id) => {
                user.posts.insert(*id);
            }
        }
    }
}

/// Selects the post document an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostFilter {
    /// Document id.
    pub id: PostId,
    /// Required current status, if any.
    pub status: Option<Status>,
}

impl PostFilter {
    /// Match by id only.
    pub fn id(id: PostId) -> Self {
        Self { id, status: None }
    }

    /// Match by id, and only while the post is active.
    pub fn active(id: PostId) -> Self {
        Self {
            id,
            status: Some(Status::Active),
        }
    }

    /// Whether `post` satisfies the filter.
    pub fn matches(&self, post: &Post) -> bool {
        post.id == self.id && self.status.map_or(true, |s| post.status == s)
    }
}

/// One field-level change to a post document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostUpdate {
    /// Set the description.
    SetDescription(String),
    /// Set the body.
    SetBody(String),
    /// Set the image.
    SetImage(String),
    /// Change the status.
    SetStatus(Status),
}

impl PostUpdate {
    /// Apply the change to an in-memory document.
    pub fn apply(&self, post: &mut Post) {
        match self {
            Self::SetDescription(v) => post.description = v.clone(),
            Self::SetBody(v) => post.body = v.clone(),
            Self::SetImage(v) => post.image = v.clone(),
            Self::SetStatus(v) => post.status = *v,
        }
    }
}

/// Storage of user documents.
///
/// Implementations must enforce email uniqueness and apply each
/// `update_user` call atomically.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. `DuplicateKey("email")` if the email is taken.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    /// Fetch a user by id, whatever its status.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Fetch a user by normalized email, whatever its status.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// All users with the given status, ordered by creation time then id.
    async fn list_users(&self, status: Status) -> Result<Vec<User>, StoreError>;

    /// Conditionally apply `updates` to the document matching `filter`.
    ///
    /// Returns the updated document, or `None` if nothing matched.
    async fn update_user(
        &self,
        filter: UserFilter,
        updates: &[UserUpdate],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;
}

/// Storage of post documents.
///
/// Implementations must keep titles unique among active posts and apply each
/// `update_post` call atomically.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a new post. `DuplicateKey("title")` if an active post has the title.
    async fn insert_post(&self, post: Post) -> Result<Post, StoreError>;

    /// Fetch a post by id, whatever its status.
    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    /// All posts with the given status, ordered by creation time then id.
    async fn list_posts(&self, status: Status) -> Result<Vec<Post>, StoreError>;

    /// Posts of one author with the given status, same ordering.
    async fn list_posts_by_author(&self, author: UserId, status: Status) -> Result<Vec<Post>, StoreError>;

    /// Conditionally apply `updates` to the document matching `filter`.
    async fn update_post(
        &self,
        filter: PostFilter,
        updates: &[PostUpdate],
        now: DateTime<Utc>,
    ) -> Result<Option<Post>, StoreError>;
}

pub use memory::InMemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresStore};
