//! Shared route helpers for page rendering.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::flash::{FormErrors, Notification};
use crate::middleware::Identity;
use crate::middleware::csrf::issue_token;
use crate::session::Session;
use crate::state::AppState;

/// Everything a handler needs to render a full page.
///
/// Rendering consumes the session's flash queues and issues a fresh CSRF
/// token, so every page carries `current_user`, `notifications`,
/// `form_errors`, `csrf_token` and `path` in its context.
pub struct Page {
    state: AppState,
    session: Session,
    identity: Identity,
    path: String,
}

impl Page {
    /// Render `view` with the common context added to `context`.
    pub fn render(&self, view: &str, mut context: tera::Context) -> AppResult<Html<String>> {
        let notifications = self.session.take_notifications().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read notifications");
            Vec::<Notification>::new()
        });
        let form_errors = self.session.take_form_errors().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read form errors");
            FormErrors::new()
        });
        let csrf_token = issue_token(&self.session)?;

        context.insert("current_user", &self.identity.user());
        context.insert("notifications", &notifications);
        context.insert("form_errors", &form_errors);
        context.insert("csrf_token", &csrf_token);
        context.insert("path", &self.path);

        let html = self.state.renderer().render(view, &context)?;
        Ok(Html(html))
    }
}

impl<S> FromRequestParts<S> for Page
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let identity = Identity::from_request_parts(parts, state).await?;

        Ok(Self {
            state: AppState::from_ref(state),
            session,
            identity,
            path: parts.uri.path().to_string(),
        })
    }
}

/// Flash `notification` and redirect to `to`.
pub fn redirect_with(session: &Session, to: &str, notification: Notification) -> AppResult<Response> {
    session.notify(notification)?;
    Ok(Redirect::to(to).into_response())
}

/// Flash form errors plus a summary notification and redirect back to the form.
pub fn redirect_invalid(
    session: &Session,
    to: &str,
    form: &str,
    errors: FormErrors,
) -> AppResult<Response> {
    let mut wrapped = FormErrors::new();
    wrapped.insert(form.to_string(), Value::Object(errors));
    session.flash_form_errors(wrapped)?;
    redirect_with(session, to, Notification::error("Invalid form submission."))
}

/// Build a form-errors map from `(field, message)` pairs.
pub fn field_errors<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> FormErrors {
    pairs
        .into_iter()
        .map(|(field, message)| (field.to_string(), Value::String(message.to_string())))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_keeps_every_pair() {
        let errors = field_errors([
            ("new_password_confirmation", "do not match"),
            ("current_password", "incorrect"),
        ]);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors["current_password"], "incorrect");
    }
}
