//! Comment routes.
//!
//! Comments are created from the post page and can be edited or deleted
//! by their author only.

use axum::extract::{Path, State};
use axum::middleware::from_fn;
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::helpers::{Page, field_errors, redirect_invalid, redirect_with};
use crate::content::Policy;
use crate::error::{AppError, AppResult};
use crate::flash::Notification;
use crate::middleware::{CurrentUser, authenticated_only};
use crate::models::{Comment, NewComment, Post, User};
use crate::session::Session;
use crate::state::AppState;

const COMMENT_FORM: &str = "comment_form";

/// New comment form body.
#[derive(Debug, Deserialize)]
pub struct NewCommentForm {
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub content: String,
}

/// Comment edit form body.
#[derive(Debug, Deserialize)]
pub struct EditCommentForm {
    #[serde(default)]
    pub content: String,
}

async fn find_post(state: &AppState, id: Uuid) -> AppResult<Post> {
    state
        .store()
        .posts
        .get_by_id(id)
        .await?
        .ok_or(AppError::NotFound)
}

/// Load a comment that `user` wrote, or 404/403.
async fn find_own_comment(state: &AppState, id: Uuid, user: &User) -> AppResult<Comment> {
    let comment = state
        .store()
        .comments
        .get_by_id(id)
        .await?
        .ok_or(AppError::NotFound)?;
    if comment.user_id != user.id {
        return Err(AppError::Forbidden);
    }
    Ok(comment)
}

/// POST /comments
async fn create(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<NewCommentForm>,
) -> AppResult<Response> {
    let post_id = Uuid::parse_str(form.post_id.trim())
        .map_err(|_| AppError::BadRequest("invalid post id".to_string()))?;
    let post = find_post(&state, post_id).await?;
    let back = format!("/posts/{}", post.slug);

    let content = Policy::Permissive.sanitize(&form.content);
    if content.trim().is_empty() {
        return redirect_invalid(
            &session,
            &back,
            COMMENT_FORM,
            field_errors([("content", "Comment cannot be empty")]),
        );
    }

    let comment = state
        .store()
        .comments
        .create(NewComment {
            post_id: post.id,
            user_id: user.id,
            content,
        })
        .await?;
    info!(comment_id = %comment.id, post_id = %post.id, "comment created");

    redirect_with(
        &session,
        &back,
        Notification::success("Comment has been created successfully."),
    )
}

/// GET /comments/{id}/edit
async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    page: Page,
    Path(id): Path<Uuid>,
) -> AppResult<Html<String>> {
    let comment = find_own_comment(&state, id, &user).await?;
    let post = find_post(&state, comment.post_id).await?;

    let mut context = tera::Context::new();
    context.insert("comment", &comment);
    context.insert("post", &post);
    page.render("comment_form.html", context)
}

/// POST /comments/{id}/edit
async fn update(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Form(form): Form<EditCommentForm>,
) -> AppResult<Response> {
    let mut comment = find_own_comment(&state, id, &user).await?;

    let content = Policy::Permissive.sanitize(&form.content);
    if content.trim().is_empty() {
        return redirect_invalid(
            &session,
            &format!("/comments/{id}/edit"),
            COMMENT_FORM,
            field_errors([("content", "Comment cannot be empty")]),
        );
    }

    comment.content = content;
    comment.updated_at = Utc::now();
    state.store().comments.update(&comment).await?;
    info!(comment_id = %comment.id, "comment updated");

    let post = find_post(&state, comment.post_id).await?;
    redirect_with(
        &session,
        &format!("/posts/{}", post.slug),
        Notification::success("Comment has been updated successfully."),
    )
}

/// POST /comments/{id}/delete
async fn delete(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let comment = find_own_comment(&state, id, &user).await?;
    let post = find_post(&state, comment.post_id).await?;

    state.store().comments.delete(comment.id).await?;
    info!(comment_id = %comment.id, post_id = %post.id, "comment deleted");

    redirect_with(
        &session,
        &format!("/posts/{}", post.slug),
        Notification::success("Comment has been deleted successfully."),
    )
}

/// Create the comment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create))
        .route("/comments/{id}/edit", get(edit_page).post(update))
        .route("/comments/{id}/delete", post(delete))
        .route_layer(from_fn(authenticated_only))
}
