//! Post documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PostId, UserId};
use super::lifecycle::Status;

/// Image used when a post is created without one.
pub const DEFAULT_POST_IMAGE: &str = "default-post-image.png";

/// A stored post document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Document id.
    pub id: PostId,
    /// Title. Unique among active posts.
    pub title: String,
    /// Short summary.
    pub description: String,
    /// Post content.
    pub body: String,
    /// Image reference.
    pub image: String,
    /// Author. Fixed at creation.
    pub author: UserId,
    /// Soft-delete state.
    pub status: Status,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Build a new post from a draft.
    pub fn from_draft(draft: PostDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: PostId::generate(),
            title: draft.title.trim().to_string(),
            description: draft.description,
            body: draft.body,
            image: draft
                .image
                .filter(|image| !image.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_POST_IMAGE.to_string()),
            author: draft.author,
            status: draft.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the post is visible.
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }
}

/// Post creation input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    /// Unique among active posts.
    pub title: String,
    /// Short summary.
    pub description: String,
    /// Post text.
    pub body: String,
    /// Claimed author; must equal the authenticated actor.
    pub author: UserId,
    /// Cover image URL; the default image when absent.
    #[serde(default)]
    pub image: Option<String>,
    /// Initial status; active when absent.
    #[serde(default)]
    pub status: Option<Status>,
}

/// Partial post update.
///
/// Title and author are fixed at creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    /// New summary.
    pub description: Option<String>,
    /// New text.
    pub body: Option<String>,
    /// New cover image; blank resets to the default.
    pub image: Option<String>,
}

impl PostPatch {
    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.body.is_none() && self.image.is_none()
    }
}
