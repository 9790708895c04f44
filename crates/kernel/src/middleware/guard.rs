//! Route guards based on the resolved identity.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::auth::Identity;

/// Let only signed-in users through; others are sent to `/login`.
pub async fn authenticated_only(identity: Identity, request: Request, next: Next) -> Response {
    if !identity.is_authenticated() {
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

/// Let only anonymous visitors through; signed-in users are sent home.
pub async fn guest_only(identity: Identity, request: Request, next: Next) -> Response {
    if identity.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    next.run(request).await
}
