//! In-memory document store for tests and embedding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::types::{Post, PostId, Status, User, UserId};
use super::{PostFilter, PostStore, PostUpdate, StoreError, UserFilter, UserStore, UserUpdate};

/// In-memory document store.
///
/// Uses BTreeMap for deterministic iteration order. Each collection sits
/// behind its own lock and every update runs under a single write lock, which
/// gives the per-document atomicity the kernel relies on.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Users by ID.
    users: RwLock<BTreeMap<UserId, User>>,
    /// Posts by ID.
    posts: RwLock<BTreeMap<PostId, Post>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of user documents, any status.
    pub fn num_users(&self) -> usize {
        self.users.read().len()
    }

    /// Get number of post documents, any status.
    pub fn num_posts(&self) -> usize {
        self.posts.read().len()
    }

    /// Snapshot of all user documents.
    pub fn all_users(&self) -> Vec<User> {
        self.users.read().values().cloned().collect()
    }
}

fn by_creation<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, uuid::Uuid)) {
    items.sort_by_key(key);
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateKey("email".to_string()));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::DuplicateKey("id".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, status: Status) -> Result<Vec<User>, StoreError> {
        let mut result: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| u.status == status)
            .cloned()
            .collect();
        by_creation(&mut result, |u| (u.created_at, u.id.as_uuid()));
        Ok(result)
    }

    async fn update_user(
        &self,
        filter: UserFilter,
        updates: &[UserUpdate],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write();

        let mut updated = match users.get(&filter.id) {
            Some(user) if filter.matches(user) => user.clone(),
            _ => return Ok(None),
        };
        for update in updates {
            update.apply(&mut updated);
        }
        updated.updated_at = now;

        let email_taken = users
            .values()
            .any(|u| u.id != updated.id && u.email == updated.email);
        if email_taken {
            return Err(StoreError::DuplicateKey("email".to_string()));
        }

        users.insert(updated.id, updated.clone());
        Ok(Some(updated))
    }
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn insert_post(&self, post: Post) -> Result<Post, StoreError> {
        let mut posts = self.posts.write();
        let title_taken = post.is_active()
            && posts.values().any(|p| p.is_active() && p.title == post.title);
        if title_taken {
            return Err(StoreError::DuplicateKey("title".to_string()));
        }
        if posts.contains_key(&post.id) {
            return Err(StoreError::DuplicateKey("id".to_string()));
        }
        posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.read().get(&id).cloned())
    }

    async fn list_posts(&self, status: Status) -> Result<Vec<Post>, StoreError> {
        let mut result: Vec<Post> = self
            .posts
            .read()
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        by_creation(&mut result, |p| (p.created_at, p.id.as_uuid()));
        Ok(result)
    }

    async fn list_posts_by_author(&self, author: UserId, status: Status) -> Result<Vec<Post>, StoreError> {
        let mut result: Vec<Post> = self
            .posts
            .read()
            .values()
            .filter(|p| p.author == author && p.status == status)
            .cloned()
            .collect();
        by_creation(&mut result, |p| (p.created_at, p.id.as_uuid()));
        Ok(result)
    }

    async fn update_post(
        &self,
        filter: PostFilter,
        updates: &[PostUpdate],
        now: DateTime<Utc>,
    ) -> Result<Option<Post>, StoreError> {
        let mut posts = self.posts.write();

        let mut updated = match posts.get(&filter.id) {
            Some(post) if filter.matches(post) => post.clone(),
            _ => return Ok(None),
        };
        for update in updates {
            update.apply(&mut updated);
        }
        updated.updated_at = now;

        let title_taken = updated.is_active()
            && posts
                .values()
                .any(|p| p.id != updated.id && p.is_active() && p.title == updated.title);
        if title_taken {
            return Err(StoreError::DuplicateKey("title".to_string()));
        }

        posts.insert(updated.id, updated.clone());
        Ok(Some(updated))
    }
}
