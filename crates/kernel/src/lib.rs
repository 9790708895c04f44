//! Quire blog kernel library.
//!
//! This library exposes kernel internals for integration testing.
//! The main entry point for running the server is the `quire` binary.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod flash;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod store;
pub mod theme;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::app;
pub use state::AppState;
