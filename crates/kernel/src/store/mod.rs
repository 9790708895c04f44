//! Persistence interfaces.
//!
//! Each entity gets an async repository trait. "Not found" is `Ok(None)`
//! (or `Ok(false)` for deletes) so callers can tell it apart from an I/O
//! failure. Two implementations exist:
//!
//! - [`postgres::PgStore`]: production store backed by sqlx
//! - [`memory::MemoryStore`]: process-local maps, used when no database
//!   is configured and by the test suite

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, CommentView, NewComment, NewPost, NewUser, PasswordResetToken, Post, PostView, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from post writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another post already holds this slug.
    #[error("slug \"{0}\" is already taken")]
    SlugConflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email_address(&self, email_address: &str) -> Result<Option<User>>;

    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    async fn exists_by_email_address(&self, email_address: &str) -> Result<bool>;

    async fn create(&self, input: NewUser) -> Result<User>;

    /// Persist every mutable field of `user`.
    async fn update(&self, user: &User) -> Result<()>;

    /// Delete a user together with their posts, comments and reset tokens.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<PostView>>;

    async fn count(&self) -> Result<i64>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<PostView>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    async fn create(&self, input: NewPost) -> Result<Post, StoreError>;

    async fn update(&self, post: &Post) -> Result<(), StoreError>;

    /// Delete a post and its comments.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Oldest first.
    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<CommentView>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Comment>>;

    async fn create(&self, input: NewComment) -> Result<Comment>;

    async fn update(&self, comment: &Comment) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PasswordResetTokenRepository: Send + Sync {
    async fn create(&self, token: &PasswordResetToken) -> Result<()>;

    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// The full set of repositories handed to the application.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub reset_tokens: Arc<dyn PasswordResetTokenRepository>,
}

impl Store {
    /// All repositories backed by one in-memory store.
    pub fn memory() -> Self {
        Self::from_shared(Arc::new(MemoryStore::new()))
    }

    /// All repositories backed by one PostgreSQL pool.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_shared(Arc::new(PgStore::new(pool)))
    }

    fn from_shared<T>(store: Arc<T>) -> Self
    where
        T: UserRepository
            + PostRepository
            + CommentRepository
            + PasswordResetTokenRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            reset_tokens: store,
        }
    }
}
