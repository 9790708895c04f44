//! Identity resolution from the session's username claim.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::session::Session;
use crate::state::AppState;

/// Who is making the request, resolved once by [`resolve_identity`].
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

/// Resolve the request's identity and attach it to the request extensions.
///
/// A claim naming a user that no longer exists is cleared from the session
/// and the request continues anonymously. Any other lookup failure stops
/// the request with a 500.
pub async fn resolve_identity(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match resolve(&state, &session).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

async fn resolve(state: &AppState, session: &Session) -> AppResult<Identity> {
    let Some(username) = session.username().filter(|u| !u.is_empty()) else {
        return Ok(Identity::Anonymous);
    };

    match state.store().users.get_by_username(&username).await {
        Ok(Some(user)) => Ok(Identity::Authenticated(user)),
        Ok(None) => {
            warn!(%username, "session names a missing user, clearing claim");
            session.clear_username();
            session.save()?;
            Ok(Identity::Anonymous)
        }
        Err(e) => Err(AppError::Internal(e.context("failed to resolve session user"))),
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("identity requested before authentication layer"))
        })
    }
}

/// The signed-in user. Anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Identity::from_request_parts(parts, state).await {
            Ok(Identity::Authenticated(user)) => Ok(CurrentUser(user)),
            Ok(Identity::Anonymous) => Err(Redirect::to("/login").into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}
