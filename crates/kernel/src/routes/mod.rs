//! HTTP route handlers.

pub mod auth;
pub mod comment;
pub mod health;
pub mod helpers;
pub mod home;
pub mod password_reset;
pub mod post;
pub mod profile;

use axum::Router;
use axum::middleware::from_fn_with_state;
use tower_cookies::CookieManagerLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{handle_panic, resolve_identity, verify_csrf};
use crate::state::AppState;

/// Build the application router with its full middleware stack.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(home::router())
        .merge(health::router())
        .merge(auth::router())
        .merge(password_reset::router())
        .merge(profile::router())
        .merge(post::router())
        .merge(comment::router())
        // Middleware layers (last added = first executed in request flow):
        // trace → compression → cookies → CSRF → recovery → auth → guard → routes
        .layer(from_fn_with_state(state.clone(), resolve_identity))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn_with_state(state.clone(), verify_csrf))
        .layer(CookieManagerLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
