//! Profile routes.

use axum::extract::State;
use axum::middleware::from_fn;
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::info;

use super::helpers::{Page, field_errors, redirect_invalid, redirect_with};
use crate::error::AppResult;
use crate::flash::Notification;
use crate::middleware::{CurrentUser, authenticated_only};
use crate::session::Session;
use crate::state::AppState;

const PROFILE_FORM: &str = "profile_form";
const PROFILE_PASSWORD_FORM: &str = "profile_password_form";

/// Profile form body.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Password change form body.
#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirmation: String,
}

/// GET /profile
async fn profile_page(page: Page) -> AppResult<Html<String>> {
    page.render("profile.html", tera::Context::new())
}

/// POST /profile
async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(mut user): CurrentUser,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let name = form.name.trim();
    let email_address = form.email_address.trim();
    let avatar_url = form.avatar_url.trim();

    let mut errors = Vec::new();
    if name.is_empty() {
        errors.push(("name", "Name is required"));
    }
    if email_address.is_empty() {
        errors.push(("email_address", "Email address is required"));
    } else if email_address != user.email_address
        && state
            .store()
            .users
            .exists_by_email_address(email_address)
            .await?
    {
        errors.push(("email_address", "Email address is already registered"));
    }
    if !avatar_url.is_empty() && url::Url::parse(avatar_url).is_err() {
        errors.push(("avatar_url", "Avatar URL is not a valid URL"));
    }
    if !errors.is_empty() {
        return redirect_invalid(&session, "/profile", PROFILE_FORM, field_errors(errors));
    }

    user.name = name.to_string();
    user.email_address = email_address.to_string();
    user.avatar_url = (!avatar_url.is_empty()).then(|| avatar_url.to_string());
    state.store().users.update(&user).await?;
    info!(user_id = %user.id, "profile updated");

    redirect_with(
        &session,
        "/profile",
        Notification::success("Profile has been updated successfully."),
    )
}

/// POST /profile/password
async fn update_password(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(mut user): CurrentUser,
    Form(form): Form<PasswordForm>,
) -> AppResult<Response> {
    let mut errors = Vec::new();
    if form.current_password.is_empty() {
        errors.push(("current_password", "Current password is required"));
    } else if !user.verify_password(&form.current_password) {
        errors.push(("current_password", "Current password is incorrect"));
    }
    if form.new_password.is_empty() {
        errors.push(("new_password", "New password is required"));
    } else if form.new_password != form.new_password_confirmation {
        errors.push((
            "new_password_confirmation",
            "New password and confirmation do not match",
        ));
    }
    if !errors.is_empty() {
        return redirect_invalid(
            &session,
            "/profile",
            PROFILE_PASSWORD_FORM,
            field_errors(errors),
        );
    }

    user.set_password(&form.new_password)?;
    state.store().users.update(&user).await?;
    info!(user_id = %user.id, "password changed");

    redirect_with(
        &session,
        "/profile",
        Notification::success("Password has been updated successfully."),
    )
}

/// Create the profile router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile_page).post(update_profile))
        .route("/profile/password", post(update_password))
        .route_layer(from_fn(authenticated_only))
}
