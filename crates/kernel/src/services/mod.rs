//! Outbound services used by request handlers.

pub mod email;

pub use email::{LogMailer, Mailer, SmtpMailer};
