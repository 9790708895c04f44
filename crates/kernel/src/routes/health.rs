//! Health check endpoint.
//!
//! Returns 200 OK while serving and 503 Service Unavailable once a
//! shutdown signal has been received, so load balancers stop routing
//! new traffic during the drain.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

use crate::state::AppState;

/// Health check handler.
async fn healthz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "Shutting down")
    } else {
        (StatusCode::OK, "OK")
    }
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}
