//! Password reset routes.

use axum::extract::{Query, State};
use axum::middleware::from_fn;
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::helpers::{Page, field_errors, redirect_invalid, redirect_with};
use crate::error::{AppError, AppResult};
use crate::flash::Notification;
use crate::middleware::guest_only;
use crate::models::PasswordResetToken;
use crate::models::password_reset::hash_token;
use crate::session::Session;
use crate::state::AppState;

const FORGOT_PASSWORD_FORM: &str = "forgot_password_form";
const RESET_PASSWORD_FORM: &str = "reset_password_form";

/// Forgot-password form body.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email_address: String,
}

/// Query string of the emailed reset link.
#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
}

/// Reset-password form body.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirmation: String,
}

/// GET /forgot-password
async fn forgot_password_page(page: Page) -> AppResult<Html<String>> {
    page.render("forgot_password.html", tera::Context::new())
}

/// POST /forgot-password
///
/// The response is the same whether or not the address belongs to an
/// account, and mail delivery failures are only logged.
async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> AppResult<Response> {
    let email_address = form.email_address.trim();
    if email_address.is_empty() {
        return redirect_invalid(
            &session,
            "/forgot-password",
            FORGOT_PASSWORD_FORM,
            field_errors([("email_address", "Email address is required")]),
        );
    }

    match state.store().users.get_by_email_address(email_address).await? {
        Some(user) => {
            let (record, plain_token) = PasswordResetToken::issue(user.id);
            state.store().reset_tokens.create(&record).await?;

            let link = format!("{}/reset-password?token={plain_token}", state.site_url());
            let body = format!(
                "To reset your password, click the following link:\n\n{link}\n\n\
                 If you did not request a password reset, you can ignore this email."
            );

            match state
                .mailer()
                .send(email_address, "Password Reset Request", &body)
                .await
            {
                Ok(()) => info!(user_id = %user.id, "password reset email sent"),
                Err(e) => error!(error = %e, user_id = %user.id, "failed to send password reset email"),
            }
        }
        None => {
            info!(email = %email_address, "password reset requested for non-existent email");
        }
    }

    redirect_with(
        &session,
        "/",
        Notification::success("Reset password link has been sent successfully."),
    )
}

/// GET /reset-password?token=...
async fn reset_password_page(
    page: Page,
    Query(query): Query<ResetQuery>,
) -> AppResult<Html<String>> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("token is required".to_string()))?;

    let mut context = tera::Context::new();
    context.insert("token", &token);
    page.render("reset_password.html", context)
}

/// POST /reset-password
async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetPasswordForm>,
) -> AppResult<Response> {
    if form.token.is_empty() {
        return Err(AppError::BadRequest("token is required".to_string()));
    }

    let store = state.store();
    let record = store
        .reset_tokens
        .get_by_token_hash(&hash_token(&form.token))
        .await?;

    let Some(record) = record else {
        warn!("password reset attempted with unknown token");
        return redirect_with(
            &session,
            "/forgot-password",
            Notification::error("Reset link is invalid or has expired."),
        );
    };

    if record.is_expired(Utc::now()) {
        store.reset_tokens.delete(record.id).await?;
        return redirect_with(
            &session,
            "/forgot-password",
            Notification::error("Reset link is invalid or has expired."),
        );
    }

    let mut errors = Vec::new();
    if form.new_password.is_empty() {
        errors.push(("new_password", "New password is required"));
    } else if form.new_password != form.new_password_confirmation {
        errors.push((
            "new_password_confirmation",
            "New password and confirmation do not match",
        ));
    }
    if !errors.is_empty() {
        let back = format!("/reset-password?token={}", form.token);
        return redirect_invalid(&session, &back, RESET_PASSWORD_FORM, field_errors(errors));
    }

    let Some(mut user) = store.users.get_by_id(record.user_id).await? else {
        store.reset_tokens.delete(record.id).await?;
        return Err(AppError::NotFound);
    };

    user.set_password(&form.new_password)?;
    store.users.update(&user).await?;

    if let Err(e) = store.reset_tokens.delete(record.id).await {
        error!(error = %e, token_id = %record.id, "failed to delete used reset token");
    }
    info!(user_id = %user.id, "password reset completed");

    redirect_with(
        &session,
        "/login",
        Notification::success("Password has been reset successfully."),
    )
}

/// Create the password reset router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/forgot-password",
            get(forgot_password_page).post(forgot_password),
        )
        .route("/reset-password", get(reset_password_page).post(reset_password))
        .route_layer(from_fn(guest_only))
}
