//! One-shot notifications and form errors carried across a redirect.
//!
//! Both queues live in the session. Writing appends and saves; taking
//! clears the queue and saves, restoring it if the save fails so nothing
//! is lost without having been delivered.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::{Session, SessionData, SessionError};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Success,
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }
}

/// Field identifier to validation payload.
pub type FormErrors = Map<String, Value>;

impl Session {
    /// Queue a notification and save the session.
    pub fn notify(&self, notification: Notification) -> Result<(), SessionError> {
        self.update(|data| data.notifications.push(notification));
        self.save()
    }

    /// Queue a set of form errors and save the session.
    pub fn flash_form_errors(&self, errors: FormErrors) -> Result<(), SessionError> {
        self.update(|data| data.form_errors.push(errors));
        self.save()
    }

    /// Take every queued notification, in the order they were written.
    pub fn take_notifications(&self) -> Result<Vec<Notification>, SessionError> {
        self.take_queue(
            |data| std::mem::take(&mut data.notifications),
            |data, taken| {
                let newer = std::mem::replace(&mut data.notifications, taken);
                data.notifications.extend(newer);
            },
        )
    }

    /// Take every queued form-error set, merged into one map.
    ///
    /// Later entries win when two sets name the same field.
    pub fn take_form_errors(&self) -> Result<FormErrors, SessionError> {
        let entries = self.take_queue(
            |data| std::mem::take(&mut data.form_errors),
            |data, taken| {
                let newer = std::mem::replace(&mut data.form_errors, taken);
                data.form_errors.extend(newer);
            },
        )?;

        let mut merged = FormErrors::new();
        for entry in entries {
            merged.extend(entry);
        }
        Ok(merged)
    }

    fn take_queue<T>(
        &self,
        take: impl FnOnce(&mut SessionData) -> Vec<T>,
        restore: impl FnOnce(&mut SessionData, Vec<T>),
    ) -> Result<Vec<T>, SessionError> {
        let taken = self.update(take);
        if taken.is_empty() {
            return Ok(taken);
        }

        match self.save() {
            Ok(()) => Ok(taken),
            Err(e) => {
                self.update(|data| restore(data, taken));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tower_cookies::Cookies;

    use super::*;
    use crate::session::{MAX_PAYLOAD_BYTES, SessionStore};

    fn store() -> Arc<SessionStore> {
        Arc::new(
            SessionStore::new(
                "blog",
                "flash-test-secret-with-plenty-of-bytes",
                false,
                std::time::Duration::from_secs(3600),
            )
            .unwrap(),
        )
    }

    #[test]
    fn notifications_are_read_once_in_write_order() {
        let store = store();
        let jar = Cookies::default();

        let first = Session::load(store.clone(), jar.clone());
        first.notify(Notification::success("Post created.")).unwrap();
        first.notify(Notification::info("Welcome back.")).unwrap();

        let second = Session::load(store.clone(), jar.clone());
        let read = second.take_notifications().unwrap();
        assert_eq!(
            read,
            vec![
                Notification::success("Post created."),
                Notification::info("Welcome back."),
            ]
        );

        let third = Session::load(store, jar);
        assert!(third.take_notifications().unwrap().is_empty());
    }

    #[test]
    fn form_errors_are_merged() {
        let session = Session::load(store(), Cookies::default());

        let mut a = FormErrors::new();
        a.insert("Title".into(), json!("required"));
        a.insert("Content".into(), json!("too short"));
        session.flash_form_errors(a).unwrap();

        let mut b = FormErrors::new();
        b.insert("Content".into(), json!("required"));
        session.flash_form_errors(b).unwrap();

        let merged = session.take_form_errors().unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["Title"], json!("required"));
        assert_eq!(merged["Content"], json!("required"));
        assert!(session.take_form_errors().unwrap().is_empty());
    }

    #[test]
    fn failed_save_keeps_notifications() {
        let session = Session::load(store(), Cookies::default());
        session.update(|data| {
            data.notifications.push(Notification::warning("keep me"));
            // Push the payload over the cookie limit so the save fails
            data.username = Some("x".repeat(MAX_PAYLOAD_BYTES));
        });

        assert!(session.take_notifications().is_err());
        assert_eq!(
            session.snapshot().notifications,
            vec![Notification::warning("keep me")]
        );
    }

    #[test]
    fn notification_kind_serializes_lowercase() {
        let value = serde_json::to_value(Notification::error("nope")).unwrap();
        assert_eq!(value, json!({"kind": "error", "message": "nope"}));
    }
}
