//! Post write pipeline: sanitize, derive the excerpt, allocate the slug, persist.

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::excerpt::{DEFAULT_EXCERPT_LEN, excerpt};
use super::sanitize::Policy;
use super::slug::{self, SlugError};
use crate::models::{NewPost, Post};
use crate::store::{PostRepository, StoreError};

/// Attempts at persisting a post when a concurrent writer takes its slug.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Slugs that would shadow fixed routes under `/posts/`.
const RESERVED_SLUGS: &[&str] = &["new"];

/// Post fields as submitted by an author.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: String,
    /// Explicit slug; the title is used when empty.
    pub slug: String,
    /// Explicit excerpt; derived from the content when empty.
    pub excerpt: String,
    pub content: String,
}

/// Errors from publishing a post.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Slug(#[from] SlugError),

    #[error("slug still conflicting after {MAX_WRITE_ATTEMPTS} attempts")]
    Contended,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Sanitized, derived fields shared by create and update.
struct Prepared {
    title: String,
    slug_source: String,
    excerpt: String,
    content: String,
}

fn prepare(input: PostInput) -> Prepared {
    let title = input.title.trim().to_string();
    let slug_source = if input.slug.trim().is_empty() {
        title.clone()
    } else {
        input.slug
    };

    let plain = if input.excerpt.trim().is_empty() {
        Policy::Strict.sanitize(&input.content)
    } else {
        Policy::Strict.sanitize(&input.excerpt)
    };

    Prepared {
        title,
        slug_source,
        excerpt: excerpt(plain.trim(), DEFAULT_EXCERPT_LEN),
        content: Policy::Permissive.sanitize(&input.content),
    }
}

/// Creates and updates posts against a repository.
pub struct PostService<'a> {
    posts: &'a dyn PostRepository,
}

impl<'a> PostService<'a> {
    pub fn new(posts: &'a dyn PostRepository) -> Self {
        Self { posts }
    }

    /// Allocate a slug for `candidate`. `own` is the slug the post already
    /// holds, which counts as free.
    async fn allocate(&self, candidate: &str, own: Option<&str>) -> Result<String, SlugError> {
        slug::allocate(candidate, |slug| async move {
            if RESERVED_SLUGS.contains(&slug.as_str()) {
                return Ok(true);
            }
            if own == Some(slug.as_str()) {
                return Ok(false);
            }
            self.posts.slug_exists(&slug).await
        })
        .await
    }

    /// Create a post owned by `author_id`.
    pub async fn create(&self, author_id: Uuid, input: PostInput) -> Result<Post, PublishError> {
        let prepared = prepare(input);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let slug = self.allocate(&prepared.slug_source, None).await?;
            let new_post = NewPost {
                title: prepared.title.clone(),
                slug,
                excerpt: prepared.excerpt.clone(),
                content: prepared.content.clone(),
                author_id,
            };

            match self.posts.create(new_post).await {
                Ok(post) => {
                    info!(post_id = %post.id, slug = %post.slug, "post created");
                    return Ok(post);
                }
                Err(StoreError::SlugConflict(slug)) => {
                    warn!(%slug, attempt, "slug taken by a concurrent writer, retrying");
                }
                Err(StoreError::Other(e)) => return Err(e.into()),
            }
        }

        Err(PublishError::Contended)
    }

    /// Apply `input` to an existing post.
    ///
    /// A post whose normalized slug is unchanged keeps it without probing.
    /// While probing, the slug the post already holds counts as free, so an
    /// unchanged title keeps a suffixed slug such as `hello-world-2`.
    pub async fn update(&self, existing: Post, input: PostInput) -> Result<Post, PublishError> {
        let prepared = prepare(input);
        let normalized = slug::normalize(&prepared.slug_source);

        let mut post = existing;
        let own = post.slug.clone();
        post.title = prepared.title;
        post.excerpt = prepared.excerpt;
        post.content = prepared.content;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            post.slug = if normalized == own {
                normalized.clone()
            } else {
                self.allocate(&prepared.slug_source, Some(own.as_str())).await?
            };

            match self.posts.update(&post).await {
                Ok(()) => {
                    info!(post_id = %post.id, slug = %post.slug, "post updated");
                    return Ok(post);
                }
                Err(StoreError::SlugConflict(slug)) => {
                    warn!(%slug, attempt, "slug taken by a concurrent writer, retrying");
                }
                Err(StoreError::Other(e)) => return Err(e.into()),
            }
        }

        Err(PublishError::Contended)
    }
}
