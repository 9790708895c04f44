//! Domain records.
//!
//! Each record derives `sqlx::FromRow` for the PostgreSQL store and
//! `Serialize` so it can be handed straight to templates.

pub mod comment;
pub mod password_reset;
pub mod post;
pub mod user;

pub use comment::{Comment, CommentView, NewComment};
pub use password_reset::PasswordResetToken;
pub use post::{NewPost, Post, PostView};
pub use user::{NewUser, User};
