//! User model and password hashing.

use anyhow::Result;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// User record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Login name, unique.
    pub username: String,

    /// Email address, unique.
    pub email_address: String,

    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Display name.
    pub name: String,

    pub avatar_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email_address: String,
    pub password_hash: String,
    pub name: String,
}

impl NewUser {
    /// Build a new account, hashing `password`. The display name starts as the username.
    pub fn new(username: &str, email_address: &str, password: &str) -> Result<Self> {
        Ok(Self {
            username: username.to_string(),
            email_address: email_address.to_string(),
            password_hash: hash_password(password)?,
            name: username.to_string(),
        })
    }
}

impl User {
    /// Materialize a stored record from creation input.
    pub fn from_new(input: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            username: input.username,
            email_address: input.email_address,
            password_hash: input.password_hash,
            name: input.name,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Verify a password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password_hash.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Replace the stored hash with one for `password`.
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = hash_password(password)?;
        Ok(())
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
