//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Minimum length of the session secret in bytes.
const MIN_SESSION_SECRET_LEN: usize = 32;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. When None, the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Session cookie name (default: "blog").
    pub session_name: String,

    /// Key material for the encrypted session cookie.
    pub session_secret: String,

    /// Whether the session cookie carries the `Secure` attribute.
    pub session_secure: bool,

    /// Session cookie lifetime (default: 14 days).
    pub session_max_age: Duration,

    /// Origins accepted by CSRF validation in addition to the request host.
    pub csrf_trusted_origins: Vec<String>,

    /// Path to the templates directory (default: ./templates).
    pub templates_dir: PathBuf,

    /// SMTP host for email delivery. When None, mail is only logged.
    pub smtp_host: Option<String>,

    /// SMTP port (default: 587).
    pub smtp_port: u16,

    /// SMTP username for authentication.
    pub smtp_username: Option<String>,

    /// SMTP password for authentication.
    pub smtp_password: Option<String>,

    /// SMTP encryption mode: "starttls" (default), "tls", or "none".
    pub smtp_encryption: String,

    /// From address for outgoing email.
    pub smtp_from_email: String,

    /// Public site URL for constructing links in emails.
    pub site_url: String,

    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let session_name = env::var("SESSION_NAME").unwrap_or_else(|_| "blog".to_string());

        let session_secret =
            env::var("SESSION_SECRET").context("SESSION_SECRET environment variable is required")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            bail!("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes");
        }

        let session_secure = env::var("SESSION_SECURE")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let session_max_age = env::var("SESSION_MAX_AGE_SECS")
            .unwrap_or_else(|_| "1209600".to_string())
            .parse()
            .map(Duration::from_secs)
            .context("SESSION_MAX_AGE_SECS must be a valid u64")?;

        let csrf_trusted_origins = env::var("CSRF_TRUSTED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let templates_dir = env::var("TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./templates"));

        let smtp_host = env::var("SMTP_HOST").ok();

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .context("SMTP_PORT must be a valid u16")?;

        let smtp_username = env::var("SMTP_USERNAME").ok();
        let smtp_password = env::var("SMTP_PASSWORD").ok();

        let smtp_encryption = env::var("SMTP_ENCRYPTION")
            .unwrap_or_else(|_| "starttls".to_string())
            .to_lowercase();

        let smtp_from_email =
            env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| "noreply@localhost".to_string());

        let site_url = env::var("SITE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        let shutdown_timeout = env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map(Duration::from_secs)
            .context("SHUTDOWN_TIMEOUT_SECS must be a valid u64")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            session_name,
            session_secret,
            session_secure,
            session_max_age,
            csrf_trusted_origins,
            templates_dir,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_encryption,
            smtp_from_email,
            site_url,
            shutdown_timeout,
        })
    }

    /// Configuration for tests and local experiments: in-memory store, fixed secret.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            database_url: None,
            database_max_connections: 1,
            session_name: "blog".to_string(),
            session_secret: "a-test-secret-that-is-long-enough-for-hkdf".to_string(),
            session_secure: false,
            session_max_age: Duration::from_secs(3600),
            csrf_trusted_origins: Vec::new(),
            templates_dir: PathBuf::from("./templates"),
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_encryption: "none".to_string(),
            smtp_from_email: "noreply@localhost".to_string(),
            site_url: "http://localhost".to_string(),
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}
