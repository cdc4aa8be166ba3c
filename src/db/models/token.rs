//! Server-side token records: refresh tokens and password reset tokens.
//!
//! Only SHA-256 digests of the opaque tokens are stored; the plaintext
//! lives with the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Parse an RFC3339 timestamp and report whether it is in the past.
/// Unparseable timestamps count as expired (fail closed).
fn is_past(timestamp: &str) -> bool {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => ts.with_timezone(&Utc) < Utc::now(),
        Err(_) => true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: String,
    pub token_hash: String,
    pub user_id: Option<String>,
    pub admin_id: Option<String>,
    pub expires_at: String,
    pub is_revoked: bool,
    pub revoked_at: Option<String>,
    pub created_at: String,
}

impl RefreshToken {
    pub fn is_expired(&self) -> bool {
        is_past(&self.expires_at)
    }

    pub fn is_usable(&self) -> bool {
        !self.is_revoked && !self.is_expired()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PasswordResetToken {
    pub id: String,
    pub email: String,
    pub token_hash: String,
    pub expires_at: String,
    pub is_used: bool,
    pub used_at: Option<String>,
    pub created_at: String,
}

impl PasswordResetToken {
    pub fn is_usable(&self) -> bool {
        !self.is_used && !is_past(&self.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_at: String, is_revoked: bool) -> RefreshToken {
        RefreshToken {
            id: "t1".to_string(),
            token_hash: "h".to_string(),
            user_id: Some("u1".to_string()),
            admin_id: None,
            expires_at,
            is_revoked,
            revoked_at: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_future_token_usable() {
        let t = token((Utc::now() + Duration::days(1)).to_rfc3339(), false);
        assert!(t.is_usable());
    }

    #[test]
    fn test_expired_token_unusable() {
        let t = token((Utc::now() - Duration::minutes(1)).to_rfc3339(), false);
        assert!(t.is_expired());
        assert!(!t.is_usable());
    }

    #[test]
    fn test_revoked_token_unusable() {
        let t = token((Utc::now() + Duration::days(1)).to_rfc3339(), true);
        assert!(!t.is_usable());
    }

    #[test]
    fn test_garbage_expiry_fails_closed() {
        let t = token("not-a-timestamp".to_string(), false);
        assert!(t.is_expired());
    }
}
