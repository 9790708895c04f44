//! Application state shared across all handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::content::PostService;
use crate::db;
use crate::services::{LogMailer, Mailer, SmtpMailer};
use crate::session::SessionStore;
use crate::store::Store;
use crate::theme::{Renderer, TeraRenderer};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Repositories for every entity.
    store: Store,

    /// Cookie settings and key for sessions.
    sessions: Arc<SessionStore>,

    /// Outbound mail.
    mailer: Arc<dyn Mailer>,

    /// Page renderer.
    renderer: Arc<dyn Renderer>,

    /// Public site URL for links in emails.
    site_url: String,

    /// Origins accepted by CSRF validation besides the request host.
    csrf_trusted_origins: Vec<String>,

    /// Set once a shutdown signal arrives; the health check reports 503 from then on.
    shutting_down: AtomicBool,
}

impl AppState {
    /// Build state from configuration, connecting to PostgreSQL when configured.
    pub async fn new(config: &Config) -> Result<Self> {
        let store = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections)
                    .await
                    .context("failed to create database pool")?;
                info!("Using PostgreSQL store");
                Store::postgres(pool)
            }
            None => {
                info!("DATABASE_URL not set, using in-memory store");
                Store::memory()
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.smtp_host {
            Some(host) => Arc::new(
                SmtpMailer::new(
                    host,
                    config.smtp_port,
                    config.smtp_username.as_deref(),
                    config.smtp_password.as_deref(),
                    &config.smtp_encryption,
                    config.smtp_from_email.clone(),
                )
                .context("failed to configure SMTP")?,
            ),
            None => Arc::new(LogMailer),
        };

        let renderer = Arc::new(
            TeraRenderer::new(&config.templates_dir).context("failed to load templates")?,
        );

        Self::from_parts(config, store, mailer, renderer)
    }

    /// Build state from already constructed collaborators.
    pub fn from_parts(
        config: &Config,
        store: Store,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        let sessions = SessionStore::new(
            config.session_name.clone(),
            &config.session_secret,
            config.session_secure,
            config.session_max_age,
        )
        .context("failed to create session store")?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                store,
                sessions: Arc::new(sessions),
                mailer,
                renderer,
                site_url: config.site_url.trim_end_matches('/').to_string(),
                csrf_trusted_origins: config.csrf_trusted_origins.clone(),
                shutting_down: AtomicBool::new(false),
            }),
        })
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        self.inner.sessions.clone()
    }

    pub fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.inner.mailer
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.inner.renderer
    }

    /// Post write pipeline over this state's store.
    pub fn posts(&self) -> PostService<'_> {
        PostService::new(self.inner.store.posts.as_ref())
    }

    pub fn site_url(&self) -> &str {
        &self.inner.site_url
    }

    pub fn csrf_trusted_origins(&self) -> &[String] {
        &self.inner.csrf_trusted_origins
    }

    /// Mark the server as draining.
    pub fn begin_shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }
}
