//! Encrypted cookie-backed sessions.
//!
//! The whole session lives in a single private (AES-GCM encrypted and
//! authenticated) cookie managed by `tower-cookies`. Handlers see a typed
//! [`SessionData`] through a per-request [`Session`] handle; changes only
//! reach the browser after an explicit [`Session::save`].

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use hkdf::Hkdf;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::{Cookie, Cookies, Key};

use crate::error::AppError;
use crate::flash::{FormErrors, Notification};
use crate::state::AppState;

/// Largest serialized session accepted before encryption.
///
/// Encryption and base64 grow the value by roughly a third; browsers drop
/// cookies above 4096 bytes.
pub const MAX_PAYLOAD_BYTES: usize = 2800;

/// HKDF info string used to derive the cookie key from the configured secret.
const KEY_DERIVATION_INFO: &[u8] = b"quire session cookie v1";

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("session payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// Typed contents of a session.
///
/// `None` for `username` means the claim was never set (or was cleared);
/// it is kept distinct from an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_errors: Vec<FormErrors>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub csrf_tokens: Vec<String>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Cookie settings and key shared by every session.
pub struct SessionStore {
    name: String,
    key: Key,
    secure: bool,
    max_age: std::time::Duration,
}

impl SessionStore {
    /// Create a store, deriving the 64-byte cookie key from `secret`.
    pub fn new(
        name: impl Into<String>,
        secret: &str,
        secure: bool,
        max_age: std::time::Duration,
    ) -> anyhow::Result<Self> {
        let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
        let mut okm = [0u8; 64];
        hk.expand(KEY_DERIVATION_INFO, &mut okm)
            .map_err(|e| anyhow::anyhow!("failed to derive session key: {e}"))?;
        let key = Key::try_from(&okm[..])
            .map_err(|e| anyhow::anyhow!("invalid session key material: {e}"))?;

        Ok(Self {
            name: name.into(),
            key,
            secure,
            max_age,
        })
    }

    /// Session cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, cookies: &Cookies) -> SessionData {
        let Some(cookie) = cookies.private(&self.key).get(&self.name) else {
            return SessionData::default();
        };

        match serde_json::from_str(cookie.value()) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable session cookie");
                SessionData::default()
            }
        }
    }

    fn write(&self, cookies: &Cookies, data: &SessionData) -> Result<(), SessionError> {
        let jar = cookies.private(&self.key);

        if data.is_empty() {
            if jar.get(&self.name).is_some() {
                jar.remove(Cookie::build((self.name.clone(), "")).path("/").build());
            }
            return Ok(());
        }

        let payload = serde_json::to_string(data)?;
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(SessionError::TooLarge {
                size: payload.len(),
                limit: MAX_PAYLOAD_BYTES,
            });
        }

        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        let cookie = Cookie::build((self.name.clone(), payload))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(CookieDuration::seconds(max_age))
            .build();
        jar.add(cookie);

        Ok(())
    }
}

/// Per-request session handle.
///
/// Cloning is cheap and every clone sees the same data, so the auth layer,
/// CSRF layer and handler all work on one copy.
#[derive(Clone)]
pub struct Session {
    data: Arc<Mutex<SessionData>>,
    cookies: Cookies,
    store: Arc<SessionStore>,
}

impl Session {
    /// Load the session for a request from its cookie jar.
    ///
    /// A missing, tampered or undecodable cookie yields an empty session.
    pub fn load(store: Arc<SessionStore>, cookies: Cookies) -> Self {
        let data = store.read(&cookies);
        Self {
            data: Arc::new(Mutex::new(data)),
            cookies,
            store,
        }
    }

    /// The identity claim, if one is set.
    pub fn username(&self) -> Option<String> {
        self.data.lock().username.clone()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        self.data.lock().username = Some(username.into());
    }

    pub fn clear_username(&self) {
        self.data.lock().username = None;
    }

    /// Run `f` with mutable access to the session contents.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        f(&mut self.data.lock())
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> SessionData {
        self.data.lock().clone()
    }

    /// Write the session back to the response cookie.
    pub fn save(&self) -> Result<(), SessionError> {
        let data = self.snapshot();
        self.store.write(&self.cookies, &data)
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let cookies = parts.extensions.get::<Cookies>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("cookie manager layer is not installed"))
        })?;

        let state = AppState::from_ref(state);
        let session = Session::load(state.sessions(), cookies);
        parts.extensions.insert(session.clone());
        Ok(session)
    }
}
