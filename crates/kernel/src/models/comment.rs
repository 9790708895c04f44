//! Comment model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Comment record as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub post_id: Uuid,

    /// Author user ID.
    pub user_id: Uuid,

    /// Sanitized HTML body.
    pub content: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Comment joined with its author's display fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommentView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub comment: Comment,

    pub author_username: String,

    pub author_name: String,

    pub author_avatar_url: Option<String>,
}

/// Input for creating a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

impl Comment {
    /// Materialize a stored record from creation input.
    pub fn from_new(input: NewComment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            post_id: input.post_id,
            user_id: input.user_id,
            content: input.content,
            created_at: now,
            updated_at: now,
        }
    }
}
