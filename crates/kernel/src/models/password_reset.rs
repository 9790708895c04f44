//! Password reset token model.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Password reset token validity period (1 hour).
const TOKEN_VALIDITY_HOURS: i64 = 1;

/// Password reset token record.
///
/// Only the SHA-256 of the emailed token is stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Issue a token for a user.
    ///
    /// Returns (token_record, plain_token) where plain_token should be sent to the user.
    pub fn issue(user_id: Uuid) -> (Self, String) {
        let plain_token = generate_token();
        let now = Utc::now();
        let record = Self {
            id: Uuid::now_v7(),
            user_id,
            token_hash: hash_token(&plain_token),
            created_at: now,
            expires_at: now + Duration::hours(TOKEN_VALIDITY_HOURS),
        };
        (record, plain_token)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Generate a secure random token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Hash a token for storage and lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
