//! Content store: posts and their soft-delete lifecycle.

use chrono::Utc;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::policy::{decide, decide_authorship};
use crate::store::{PostFilter, PostStore, PostUpdate, StoreError, UserFilter, UserStore, UserUpdate};
use crate::types::{AuthenticatedActor, Post, PostDraft, PostId, PostPatch, Status, UserId, DEFAULT_POST_IMAGE};

fn require_text(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

fn post_not_found() -> CoreError {
    CoreError::NotFound("Post".to_string())
}

/// Post creation, lookup, editing and retraction.
///
/// Needs both collections: creation checks the author and appends to the
/// author's denormalized post list.
pub struct ContentStore<S> {
    store: Arc<S>,
}

impl<S: UserStore + PostStore> ContentStore<S> {
    /// Create a content store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Publish a post authored by `actor`.
    ///
    /// Nobody creates posts in another user's name, admins included.
    pub async fn create(&self, actor: &AuthenticatedActor, draft: PostDraft) -> CoreResult<Post> {
        decide_authorship(actor, draft.author).require("you can only create posts as yourself")?;
        require_text("title", &draft.title)?;
        require_text("description", &draft.description)?;
        require_text("body", &draft.body)?;

        match self.store.find_user(draft.author).await? {
            Some(author) if author.is_active() => {}
            _ => return Err(CoreError::NotFound("Author".to_string())),
        }

        let post = self
            .store
            .insert_post(Post::from_draft(draft, Utc::now()))
            .await
            .map_err(|e| match e {
                StoreError::DuplicateKey(_) => {
                    CoreError::Conflict("a post with this title already exists".to_string())
                }
                other => other.into(),
            })?;

        // The post list on the user is a convenience copy; the post is already stored.
        if let Err(e) = self
            .store
            .update_user(UserFilter::id(post.author), &[UserUpdate::AddPost(post.id)], Utc::now())
            .await
        {
            tracing::trace!(post_id = %post.id, error = %e, "author post list not updated");
        }

        tracing::debug!(post_id = %post.id, author = %post.author, "post created");
        Ok(post)
    }

    /// Every active post, oldest first.
    pub async fn get_active(&self) -> CoreResult<Vec<Post>> {
        Ok(self.store.list_posts(Status::Active).await?)
    }

    /// One active post. `NotFound` if missing or retracted.
    pub async fn get_one(&self, id: PostId) -> CoreResult<Post> {
        self.store
            .find_post(id)
            .await?
            .filter(Post::is_active)
            .ok_or_else(post_not_found)
    }

    /// Active posts of one author.
    pub async fn posts_by(&self, author: UserId) -> CoreResult<Vec<Post>> {
        Ok(self.store.list_posts_by_author(author, Status::Active).await?)
    }

    /// Change description, body or image of a post.
    ///
    /// Title and author are not part of [`PostPatch`] and cannot change here.
    pub async fn edit(&self, id: PostId, actor: &AuthenticatedActor, patch: PostPatch) -> CoreResult<Post> {
        let post = self.get_one(id).await?;
        decide(actor, post.author).require("you can only edit your own posts")?;

        if patch.is_empty() {
            return Err(CoreError::InvalidInput("nothing to update".to_string()));
        }
        let mut updates = Vec::new();
        if let Some(description) = patch.description {
            require_text("description", &description)?;
            updates.push(PostUpdate::SetDescription(description));
        }
        if let Some(body) = patch.body {
            require_text("body", &body)?;
            updates.push(PostUpdate::SetBody(body));
        }
        if let Some(image) = patch.image {
            let image = if image.trim().is_empty() {
                DEFAULT_POST_IMAGE.to_string()
            } else {
                image
            };
            updates.push(PostUpdate::SetImage(image));
        }

        let updated = self
            .store
            .update_post(PostFilter::active(id), &updates, Utc::now())
            .await?
            .ok_or_else(post_not_found)?;

        tracing::debug!(post_id = %id, actor = %actor.id, "post edited");
        Ok(updated)
    }

    /// Soft-delete a post. `Conflict` if it is already retracted.
    pub async fn retract(&self, id: PostId, actor: &AuthenticatedActor) -> CoreResult<Post> {
        let post = self.store.find_post(id).await?.ok_or_else(post_not_found)?;
        decide(actor, post.author).require("you can only retract your own posts")?;

        if !post.is_active() {
            return Err(CoreError::Conflict("post is already retracted".to_string()));
        }

        let retracted = self
            .store
            .update_post(PostFilter::active(id), &[PostUpdate::SetStatus(Status::Inactive)], Utc::now())
            .await?
            .ok_or_else(|| CoreError::Conflict("post is already retracted".to_string()))?;

        tracing::debug!(post_id = %id, actor = %actor.id, "post retracted");
        Ok(retracted)
    }
}
