#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] builds the REAL router and middleware stack over the
//! in-memory store. Pages are rendered with `JsonRenderer`, so a test can
//! read exactly what a template would have been given (notifications,
//! form errors, the CSRF token). Outgoing mail is captured instead of sent.
//!
//! [`Browser`] keeps a cookie jar and the most recently issued CSRF token
//! between requests, the way a real browser session would.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use quire_kernel::services::Mailer;
use quire_kernel::store::Store;
use quire_kernel::theme::{JsonRenderer, Renderer};
use quire_kernel::{AppState, Config};

/// A message handed to the mailer.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records every message instead of delivering it.
#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent.lock().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: Arc<CapturingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Store::memory(), Arc::new(JsonRenderer))
    }

    /// Build the app around a custom store and renderer.
    ///
    /// Every app shares the testing session secret, so a browser's cookies
    /// stay valid when carried from one app to another.
    pub fn with(store: Store, renderer: Arc<dyn Renderer>) -> Self {
        let config = Config::for_testing();
        let mailer = Arc::new(CapturingMailer::default());
        let state = AppState::from_parts(&config, store, mailer.clone(), renderer)
            .expect("Failed to build AppState");

        Self {
            router: quire_kernel::app(state.clone()),
            state,
            mailer,
        }
    }

    /// Start a fresh browser session against this app.
    pub fn browser(&self) -> Browser<'_> {
        Browser {
            app: self,
            cookies: BTreeMap::new(),
            csrf_token: None,
        }
    }

    /// Send a raw request, without cookies.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            location,
            set_cookies,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            raw: bytes.to_vec(),
        }
    }

    /// Messages captured by the mailer so far.
    pub fn sent_mail(&self) -> Vec<SentMail> {
        self.mailer.sent.lock().clone()
    }
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub set_cookies: Vec<String>,
    pub headers: HeaderMap,
    pub body: String,
    /// The body exactly as sent, before any lossy UTF-8 conversion.
    pub raw: Vec<u8>,
}

impl TestResponse {
    /// The render context of a page, as produced by `JsonRenderer`.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", self.body))
    }

    /// Notification messages shown on this page, in order.
    pub fn messages(&self) -> Vec<String> {
        self.json()["notifications"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|n| n["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.body);
        assert_eq!(self.location.as_deref(), Some(to));
    }
}

/// A client that carries cookies and the latest CSRF token between requests.
pub struct Browser<'a> {
    app: &'a TestApp,
    cookies: BTreeMap<String, String>,
    csrf_token: Option<String>,
}

impl Browser<'_> {
    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn absorb(&mut self, response: &TestResponse) {
        for raw in &response.set_cookies {
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let expired = raw
                .split(';')
                .any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));
            if value.is_empty() || expired {
                self.cookies.remove(name.trim());
            } else {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }

        if let Ok(Value::Object(context)) = serde_json::from_str::<Value>(&response.body)
            && let Some(token) = context.get("csrf_token").and_then(Value::as_str)
        {
            self.csrf_token = Some(token.to_string());
        }
    }

    /// Send `request` with this browser's cookies and remember what comes back.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookies) = self.cookie_header() {
            request
                .headers_mut()
                .insert(header::COOKIE, cookies.parse().unwrap());
        }
        let response = self.app.send(request).await;
        self.absorb(&response);
        response
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Submit a form with the latest CSRF token.
    pub async fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let token = self.csrf_token.take().unwrap_or_default();
        self.post_with_token(path, &token, fields).await
    }

    /// Submit a form with an explicit CSRF token.
    pub async fn post_with_token(
        &mut self,
        path: &str,
        token: &str,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("_token", token)
            .extend_pairs(fields.iter().copied())
            .finish();

        self.send(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// The same cookies, pointed at another app.
    pub fn carry_to<'b>(&self, app: &'b TestApp) -> Browser<'b> {
        Browser {
            app,
            cookies: self.cookies.clone(),
            csrf_token: self.csrf_token.clone(),
        }
    }

    /// Whether the browser currently holds a session cookie.
    pub fn has_session(&self) -> bool {
        self.cookies.contains_key("blog")
    }

    /// Register and sign in a new account.
    pub async fn register(&mut self, username: &str, password: &str) {
        self.get("/register").await;
        let email = format!("{username}@example.com");
        let response = self
            .post(
                "/register",
                &[
                    ("username", username),
                    ("email_address", email.as_str()),
                    ("password", password),
                    ("password_confirmation", password),
                ],
            )
            .await;
        response.assert_redirect("/");
    }

    /// Create a post from the new-post form and return its slug.
    pub async fn create_post(&mut self, title: &str, content: &str) -> String {
        self.get("/posts/new").await;
        let response = self
            .post("/posts", &[("title", title), ("content", content)])
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "body: {}", response.body);
        response
            .location
            .as_deref()
            .and_then(|l| l.strip_prefix("/posts/"))
            .expect("redirect to the new post")
            .to_string()
    }
}
