//! Credential primitives: password hashing, signed access tokens and
//! opaque refresh tokens.
//!
//! Access tokens are HS256 JWTs carrying the account id and an account
//! kind (`user` or `admin`). Refresh tokens are random strings; only
//! their SHA-256 digest is ever stored.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const TOKEN_KIND_USER: &str = "user";
pub const TOKEN_KIND_ADMIN: &str = "admin";

#[derive(Debug, Error)]
pub enum TokenError {
    /// Covers bad signature, expiry, malformed token and wrong account
    /// kind. Callers must not distinguish these cases in responses.
    #[error("token is invalid or expired")]
    Invalid,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id (user or admin uuid)
    pub sub: String,
    /// Account kind: "user" or "admin"
    pub typ: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Issue a signed access token for an account.
pub fn issue_access_token(
    subject: &str,
    kind: &str,
    secret: &str,
    lifetime_minutes: i64,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        typ: kind.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(lifetime_minutes)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Signing)
}

/// Decode and verify an access token, requiring the given account kind.
///
/// Fails closed: any decode, signature, expiry or kind mismatch collapses
/// to [`TokenError::Invalid`].
pub fn verify_access_token(token: &str, kind: &str, secret: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| TokenError::Invalid)?;

    if data.claims.typ != kind {
        return Err(TokenError::Invalid);
    }

    Ok(data.claims)
}

/// Generate an opaque random token (refresh tokens, session tokens,
/// password reset tokens).
pub fn generate_opaque_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash an opaque token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
