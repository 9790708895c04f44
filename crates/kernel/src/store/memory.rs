//! In-memory store.
//!
//! Mirrors the PostgreSQL schema's constraints that the application relies
//! on: unique usernames, email addresses and slugs, and cascading deletes.

use std::collections::HashMap;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    CommentRepository, PasswordResetTokenRepository, PostRepository, StoreError, UserRepository,
};
use crate::models::{
    Comment, CommentView, NewComment, NewPost, NewUser, PasswordResetToken, Post, PostView, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    reset_tokens: HashMap<Uuid, PasswordResetToken>,
}

impl Tables {
    fn post_view(&self, post: &Post) -> Option<PostView> {
        let author = self.users.get(&post.author_id)?;
        Some(PostView {
            post: post.clone(),
            author_username: author.username.clone(),
            author_name: author.name.clone(),
            author_avatar_url: author.avatar_url.clone(),
        })
    }

    fn slug_taken_by_other(&self, slug: &str, id: Uuid) -> bool {
        self.posts.values().any(|p| p.slug == slug && p.id != id)
    }
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_by_email_address(&self, email_address: &str) -> Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email_address == email_address)
            .cloned())
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .any(|u| u.username == username))
    }

    async fn exists_by_email_address(&self, email_address: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .any(|u| u.email_address == email_address))
    }

    async fn create(&self, input: NewUser) -> Result<User> {
        let mut tables = self.tables.write();
        if tables
            .users
            .values()
            .any(|u| u.username == input.username || u.email_address == input.email_address)
        {
            bail!("duplicate username or email address");
        }

        let user = User::from_new(input);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write();
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email_address == user.email_address)
        {
            bail!("duplicate email address");
        }

        let Some(stored) = tables.users.get_mut(&user.id) else {
            bail!("user {} does not exist", user.id);
        };
        *stored = user.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }

        let owned_posts: Vec<Uuid> = tables
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        tables.posts.retain(|_, p| p.author_id != id);
        tables
            .comments
            .retain(|_, c| c.user_id != id && !owned_posts.contains(&c.post_id));
        tables.reset_tokens.retain(|_, t| t.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<PostView>> {
        let tables = self.tables.read();
        let mut posts: Vec<&Post> = tables.posts.values().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(offset.max(0))?;
        let limit = usize::try_from(limit.max(0))?;
        Ok(posts
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|p| tables.post_view(p))
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(i64::try_from(self.tables.read().posts.len())?)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self.tables.read().posts.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<PostView>> {
        let tables = self.tables.read();
        Ok(tables
            .posts
            .values()
            .find(|p| p.slug == slug)
            .and_then(|p| tables.post_view(p)))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.tables.read().posts.values().any(|p| p.slug == slug))
    }

    async fn create(&self, input: NewPost) -> Result<Post, StoreError> {
        let mut tables = self.tables.write();
        if tables.slug_taken_by_other(&input.slug, Uuid::nil()) {
            return Err(StoreError::SlugConflict(input.slug));
        }

        let post = Post::from_new(input);
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update(&self, post: &Post) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.slug_taken_by_other(&post.slug, post.id) {
            return Err(StoreError::SlugConflict(post.slug.clone()));
        }

        let Some(stored) = tables.posts.get_mut(&post.id) else {
            return Err(anyhow::anyhow!("post {} does not exist", post.id).into());
        };
        *stored = post.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.posts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(true)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<CommentView>> {
        let tables = self.tables.read();
        let mut comments: Vec<&Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(comments
            .into_iter()
            .filter_map(|c| {
                let author = tables.users.get(&c.user_id)?;
                Some(CommentView {
                    comment: c.clone(),
                    author_username: author.username.clone(),
                    author_name: author.name.clone(),
                    author_avatar_url: author.avatar_url.clone(),
                })
            })
            .collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.tables.read().comments.get(&id).cloned())
    }

    async fn create(&self, input: NewComment) -> Result<Comment> {
        let mut tables = self.tables.write();
        if !tables.posts.contains_key(&input.post_id) {
            bail!("post {} does not exist", input.post_id);
        }

        let comment = Comment::from_new(input);
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update(&self, comment: &Comment) -> Result<()> {
        let mut tables = self.tables.write();
        let Some(stored) = tables.comments.get_mut(&comment.id) else {
            bail!("comment {} does not exist", comment.id);
        };
        *stored = comment.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().comments.remove(&id).is_some())
    }
}

#[async_trait]
impl PasswordResetTokenRepository for MemoryStore {
    async fn create(&self, token: &PasswordResetToken) -> Result<()> {
        self.tables
            .write()
            .reset_tokens
            .insert(token.id, token.clone());
        Ok(())
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>> {
        Ok(self
            .tables
            .read()
            .reset_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().reset_tokens.remove(&id).is_some())
    }
}
