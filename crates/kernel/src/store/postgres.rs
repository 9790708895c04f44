//! PostgreSQL store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CommentRepository, PasswordResetTokenRepository, PostRepository, StoreError, UserRepository,
};
use crate::models::{
    Comment, CommentView, NewComment, NewPost, NewUser, PasswordResetToken, Post, PostView, User,
};

/// Name of the unique constraint on `posts.slug`.
const POSTS_SLUG_CONSTRAINT: &str = "posts_slug_key";

const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.excerpt, p.content, p.author_id,
           p.created_at, p.updated_at,
           u.username AS author_username,
           u.name AS author_name,
           u.avatar_url AS author_avatar_url
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a write error, recognizing a lost race on the slug constraint.
fn post_write_error(e: sqlx::Error, slug: &str, action: &'static str) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
        && db.constraint() == Some(POSTS_SLUG_CONSTRAINT)
    {
        return StoreError::SlugConflict(slug.to_string());
    }
    StoreError::Other(anyhow::Error::new(e).context(action))
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch user by id")
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch user by username")
    }

    async fn get_by_email_address(&self, email_address: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email_address = $1")
            .bind(email_address)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch user by email address")
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .context("failed to check username")
    }

    async fn exists_by_email_address(&self, email_address: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email_address = $1)",
        )
        .bind(email_address)
        .fetch_one(&self.pool)
        .await
        .context("failed to check email address")
    }

    async fn create(&self, input: NewUser) -> Result<User> {
        let user = User::from_new(input);
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email_address, password_hash, name, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email_address)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.avatar_url)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to create user")
    }

    async fn update(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_address = $2, password_hash = $3, name = $4, avatar_url = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email_address)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.avatar_url)
        .execute(&self.pool)
        .await
        .context("failed to update user")?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<PostView>> {
        let sql = format!("{POST_VIEW_SELECT} ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, PostView>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("failed to list posts")
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .context("failed to count posts")
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch post by id")
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<PostView>> {
        let sql = format!("{POST_VIEW_SELECT} WHERE p.slug = $1");
        sqlx::query_as::<_, PostView>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch post by slug")
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .context("failed to check slug")
    }

    async fn create(&self, input: NewPost) -> Result<Post, StoreError> {
        let post = Post::from_new(input);
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, title, slug, excerpt, content, author_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(post.author_id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| post_write_error(e, &post.slug, "failed to create post"))
    }

    async fn update(&self, post: &Post) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, slug = $3, excerpt = $4, content = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .execute(&self.pool)
        .await
        .map_err(|e| post_write_error(e, &post.slug, "failed to update post"))?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete post")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<CommentView>> {
        sqlx::query_as::<_, CommentView>(
            r#"
            SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, c.updated_at,
                   u.username AS author_username,
                   u.name AS author_name,
                   u.avatar_url AS author_avatar_url
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list comments")
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Comment>> {
        sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch comment")
    }

    async fn create(&self, input: NewComment) -> Result<Comment> {
        let comment = Comment::from_new(input);
        sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, user_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to create comment")
    }

    async fn update(&self, comment: &Comment) -> Result<()> {
        sqlx::query("UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1")
            .bind(comment.id)
            .bind(&comment.content)
            .execute(&self.pool)
            .await
            .context("failed to update comment")?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete comment")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PasswordResetTokenRepository for PgStore {
    async fn create(&self, token: &PasswordResetToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .context("failed to create password reset token")?;

        Ok(())
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>> {
        sqlx::query_as::<_, PasswordResetToken>(
            "SELECT * FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .context("failed to find password reset token")
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete password reset token")?;

        Ok(result.rows_affected() > 0)
    }
}
