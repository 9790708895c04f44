//! Authentication routes (login, registration, logout).

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::info;

use super::helpers::{Page, field_errors, redirect_invalid, redirect_with};
use crate::error::AppResult;
use crate::flash::Notification;
use crate::middleware::{CurrentUser, authenticated_only, guest_only};
use crate::models::NewUser;
use crate::session::Session;
use crate::state::AppState;

/// Form-errors key for the registration form.
const REGISTER_FORM: &str = "register_form";

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form body.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

/// GET /login
async fn login_page(page: Page) -> AppResult<Html<String>> {
    page.render("login.html", tera::Context::new())
}

/// POST /login
///
/// Unknown users and wrong passwords get the same message and a 401 with
/// the form re-rendered.
async fn login(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let user = state
        .store()
        .users
        .get_by_username(form.username.trim())
        .await?
        .filter(|user| user.verify_password(&form.password));

    let Some(user) = user else {
        info!(username = %form.username, "failed login attempt");
        session.notify(Notification::error("Invalid username or password."))?;
        let mut context = tera::Context::new();
        context.insert("username", &form.username);
        let html = page.render("login.html", context)?;
        return Ok((StatusCode::UNAUTHORIZED, html).into_response());
    };

    session.set_username(&user.username);
    info!(user_id = %user.id, "user logged in");
    redirect_with(&session, "/", Notification::success("Logged in successfully."))
}

/// GET /register
async fn register_page(page: Page) -> AppResult<Html<String>> {
    page.render("register.html", tera::Context::new())
}

/// POST /register
async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let email_address = form.email_address.trim();

    let mut errors = Vec::new();
    if username.is_empty() {
        errors.push(("username", "Username is required"));
    }
    if email_address.is_empty() {
        errors.push(("email_address", "Email address is required"));
    }
    if form.password.is_empty() {
        errors.push(("password", "Password is required"));
    } else if form.password != form.password_confirmation {
        errors.push((
            "password_confirmation",
            "Password and confirmation do not match",
        ));
    }

    let users = &state.store().users;
    if !username.is_empty() && users.exists_by_username(username).await? {
        errors.push(("username", "Username is already taken"));
    }
    if !email_address.is_empty() && users.exists_by_email_address(email_address).await? {
        errors.push(("email_address", "Email address is already registered"));
    }

    if !errors.is_empty() {
        return redirect_invalid(&session, "/register", REGISTER_FORM, field_errors(errors));
    }

    let user = users
        .create(NewUser::new(username, email_address, &form.password)?)
        .await?;
    info!(user_id = %user.id, username = %user.username, "user registered");

    session.set_username(&user.username);
    redirect_with(
        &session,
        "/",
        Notification::success("User has been registered successfully."),
    )
}

/// POST /logout
async fn logout(session: Session, CurrentUser(user): CurrentUser) -> AppResult<Response> {
    session.clear_username();
    info!(user_id = %user.id, "user logged out");
    redirect_with(&session, "/", Notification::success("Logged out successfully."))
}

/// Create the authentication router.
pub fn router() -> Router<AppState> {
    let guest = Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route_layer(from_fn(guest_only));

    let authenticated = Router::new()
        .route("/logout", post(logout))
        .route_layer(from_fn(authenticated_only));

    guest.merge(authenticated)
}
