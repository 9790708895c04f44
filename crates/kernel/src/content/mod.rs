//! Content publication pipeline.
//!
//! - `sanitize`: permissive and strict HTML policies
//! - `slug`: URL slug normalization and collision-free allocation
//! - `excerpt`: word-boundary truncation
//! - `PostService`: runs all three before persisting a post

pub mod excerpt;
mod post_service;
pub mod sanitize;
pub mod slug;

pub use excerpt::{DEFAULT_EXCERPT_LEN, excerpt};
pub use post_service::{PostInput, PostService, PublishError};
pub use sanitize::Policy;
