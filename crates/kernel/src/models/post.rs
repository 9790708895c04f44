//! Post model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Post record as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub title: String,

    /// URL-safe identifier, unique across all posts.
    pub slug: String,

    /// Plain-text summary.
    pub excerpt: String,

    /// Sanitized HTML body.
    pub content: String,

    pub author_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Post joined with its author's display fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub post: Post,

    pub author_username: String,

    pub author_name: String,

    pub author_avatar_url: Option<String>,
}

/// Input for creating a post. Fields are already sanitized.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub author_id: Uuid,
}

impl Post {
    /// Materialize a stored record from creation input.
    pub fn from_new(input: NewPost) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: input.title,
            slug: input.slug,
            excerpt: input.excerpt,
            content: input.content,
            author_id: input.author_id,
            created_at: now,
            updated_at: now,
        }
    }
}
