//! Post routes.

use axum::extract::{Path, State};
use axum::middleware::from_fn;
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::info;

use super::helpers::{Page, field_errors, redirect_invalid, redirect_with};
use crate::content::PostInput;
use crate::error::{AppError, AppResult};
use crate::flash::Notification;
use crate::middleware::{CurrentUser, Identity, authenticated_only};
use crate::models::{PostView, User};
use crate::session::Session;
use crate::state::AppState;

const POST_FORM: &str = "post_form";

/// Create/edit form body.
#[derive(Debug, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
}

impl PostForm {
    fn errors(&self) -> Vec<(&'static str, &'static str)> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push(("title", "Title is required"));
        }
        if self.content.trim().is_empty() {
            errors.push(("content", "Content is required"));
        }
        errors
    }
}

impl From<PostForm> for PostInput {
    fn from(form: PostForm) -> Self {
        PostInput {
            title: form.title,
            slug: form.slug,
            excerpt: form.excerpt,
            content: form.content,
        }
    }
}

/// Load a post by slug, or 404.
async fn find_post(state: &AppState, slug: &str) -> AppResult<PostView> {
    state
        .store()
        .posts
        .get_by_slug(slug)
        .await?
        .ok_or(AppError::NotFound)
}

/// Load a post by slug that `user` wrote, or 404/403.
async fn find_own_post(state: &AppState, slug: &str, user: &User) -> AppResult<PostView> {
    let view = find_post(state, slug).await?;
    if view.post.author_id != user.id {
        return Err(AppError::Forbidden);
    }
    Ok(view)
}

/// GET /posts/{slug}
async fn show(
    State(state): State<AppState>,
    identity: Identity,
    page: Page,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let view = find_post(&state, &slug).await?;
    let comments = state.store().comments.list_by_post(view.post.id).await?;
    let is_author = identity.user().is_some_and(|u| u.id == view.post.author_id);

    let mut context = tera::Context::new();
    context.insert("post", &view);
    context.insert("comments", &comments);
    context.insert("is_author", &is_author);
    page.render("post.html", context)
}

/// GET /posts/new
async fn new_page(page: Page) -> AppResult<Html<String>> {
    let mut context = tera::Context::new();
    context.insert("action", "/posts");
    page.render("post_form.html", context)
}

/// POST /posts
async fn create(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let errors = form.errors();
    if !errors.is_empty() {
        return redirect_invalid(&session, "/posts/new", POST_FORM, field_errors(errors));
    }

    let post = state.posts().create(user.id, form.into()).await?;

    redirect_with(
        &session,
        &format!("/posts/{}", post.slug),
        Notification::success("Post has been created successfully."),
    )
}

/// GET /posts/{slug}/edit
async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    page: Page,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let view = find_own_post(&state, &slug, &user).await?;

    let mut context = tera::Context::new();
    context.insert("action", &format!("/posts/{}/edit", view.post.slug));
    context.insert("post", &view);
    page.render("post_form.html", context)
}

/// POST /posts/{slug}/edit
async fn update(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let view = find_own_post(&state, &slug, &user).await?;

    let errors = form.errors();
    if !errors.is_empty() {
        let back = format!("/posts/{}/edit", view.post.slug);
        return redirect_invalid(&session, &back, POST_FORM, field_errors(errors));
    }

    let post = state.posts().update(view.post, form.into()).await?;

    redirect_with(
        &session,
        &format!("/posts/{}", post.slug),
        Notification::success("Post has been updated successfully."),
    )
}

/// POST /posts/{slug}/delete
async fn delete(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let view = find_own_post(&state, &slug, &user).await?;

    if !state.store().posts.delete(view.post.id).await? {
        return Err(AppError::NotFound);
    }
    info!(post_id = %view.post.id, slug = %view.post.slug, "post deleted");

    redirect_with(
        &session,
        "/",
        Notification::success("Post has been deleted successfully."),
    )
}

/// Create the post router.
pub fn router() -> Router<AppState> {
    let authoring = Router::new()
        .route("/posts", post(create))
        .route("/posts/new", get(new_page))
        .route("/posts/{slug}/edit", get(edit_page).post(update))
        .route("/posts/{slug}/delete", post(delete))
        .route_layer(from_fn(authenticated_only));

    Router::new()
        .route("/posts/{slug}", get(show))
        .merge(authoring)
}
