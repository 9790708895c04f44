//! CSRF token generation and verification.
//!
//! Tokens are issued into the session when a page renders and are
//! single-use and time-limited. Every request with an unsafe method must
//! carry one, either as the `_token` form field or the `X-CSRF-Token`
//! header, and must not come from a foreign `Origin`.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;
use url::Url;

use crate::error::AppError;
use crate::session::{Session, SessionError};
use crate::state::AppState;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "_token";

/// Header carrying the token for non-form requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Maximum number of tokens to store per session.
const MAX_TOKENS: usize = 10;

/// Token validity period in seconds (1 hour).
const TOKEN_VALIDITY_SECS: i64 = 3600;

/// Largest request body buffered while looking for the form field.
const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

/// Generate a CSRF token, store it in the session and save.
pub fn issue_token(session: &Session) -> Result<String, SessionError> {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    let timestamp = chrono::Utc::now().timestamp();

    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(timestamp.to_le_bytes());
    let token = hex::encode(hasher.finalize());

    session.update(|data| {
        data.csrf_tokens.push(format!("{token}:{timestamp}"));

        // Keep only the most recent tokens
        if data.csrf_tokens.len() > MAX_TOKENS {
            let skip = data.csrf_tokens.len() - MAX_TOKENS;
            data.csrf_tokens = data.csrf_tokens.split_off(skip);
        }
    });
    session.save()?;

    Ok(token)
}

fn parse_entry(entry: &str) -> Option<(&str, i64)> {
    let (token, timestamp) = entry.split_once(':')?;
    Some((token, timestamp.parse().ok()?))
}

/// Consume `submitted` if it matches a live token in the session.
///
/// Expired tokens are pruned on success. The caller saves the session.
pub fn consume_token(session: &Session, submitted: &str) -> bool {
    if submitted.is_empty() {
        return false;
    }

    let now = chrono::Utc::now().timestamp();

    session.update(|data| {
        let found = data.csrf_tokens.iter().position(|entry| {
            parse_entry(entry).is_some_and(|(token, timestamp)| {
                bool::from(token.as_bytes().ct_eq(submitted.as_bytes()))
                    && now - timestamp <= TOKEN_VALIDITY_SECS
            })
        });

        let Some(index) = found else {
            return false;
        };

        data.csrf_tokens.remove(index);
        data.csrf_tokens.retain(|entry| {
            parse_entry(entry).is_some_and(|(_, timestamp)| now - timestamp <= TOKEN_VALIDITY_SECS)
        });
        true
    })
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Check the `Origin` (or `Referer`) header against the request host and trusted origins.
///
/// Requests without either header are allowed through to the token check.
fn origin_allowed(headers: &HeaderMap, trusted: &[String]) -> bool {
    let Some(source) = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
    else {
        return true;
    };

    let Ok(source) = source.to_str() else {
        return false;
    };
    let Ok(url) = Url::parse(source) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };

    let source_authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    if let Some(request_host) = headers.get(header::HOST).and_then(|h| h.to_str().ok())
        && request_host.eq_ignore_ascii_case(&source_authority)
    {
        return true;
    }

    let origin = url.origin().ascii_serialization();
    trusted
        .iter()
        .any(|t| t.trim_end_matches('/').eq_ignore_ascii_case(&origin))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

fn token_from_form(body: &Bytes) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden - CSRF token invalid").into_response()
}

/// Reject unsafe requests without a valid token or from a foreign origin.
pub async fn verify_csrf(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }

    if !origin_allowed(request.headers(), state.csrf_trusted_origins()) {
        warn!(path = %request.uri().path(), "CSRF: cross-origin request rejected");
        return forbidden();
    }

    let (parts, body) = request.into_parts();

    let header_token = parts
        .headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // The body is buffered so the form field can be read and then handed on
    let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "CSRF: failed to buffer request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let submitted = header_token.or_else(|| {
        if is_form(&parts.headers) {
            token_from_form(&bytes)
        } else {
            None
        }
    });

    let Some(submitted) = submitted else {
        warn!(path = %parts.uri.path(), "CSRF: missing token");
        return forbidden();
    };

    if !consume_token(&session, &submitted) {
        warn!(path = %parts.uri.path(), "CSRF: token mismatch or expired");
        return forbidden();
    }

    if let Err(e) = session.save() {
        return AppError::from(e).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
