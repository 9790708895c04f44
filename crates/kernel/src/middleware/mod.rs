//! HTTP middleware components.
//!
//! Applied around the router in this order, outermost first:
//! compression → cookies → CSRF → panic recovery → authentication →
//! guard → route. Guards are attached per route group with `route_layer`.

pub mod auth;
pub mod csrf;
pub mod guard;
pub mod recovery;

pub use auth::{CurrentUser, Identity, resolve_identity};
pub use csrf::verify_csrf;
pub use guard::{authenticated_only, guest_only};
pub use recovery::handle_panic;
