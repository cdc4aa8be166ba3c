//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::db::{appointment_status, article_status};

lazy_static! {
    /// Pragmatic email shape check; real verification happens by mail.
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();

    /// Usernames: lowercase alphanumeric with dots/dashes/underscores, 3-32 chars
    static ref USERNAME_REGEX: Regex =
        Regex::new(r"^[a-z0-9][a-z0-9._-]{2,31}$").unwrap();

    /// Phone numbers: digits with optional separators and leading +
    static ref PHONE_REGEX: Regex =
        Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$").unwrap();
}

/// Pagination query parameters shared by list endpoints.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub const MAX_PAGE_LIMIT: i64 = 100;

impl Pagination {
    /// Clamp to sane bounds rather than erroring on odd values.
    pub fn clamped(&self) -> (i64, i64) {
        let skip = self.skip.max(0);
        let limit = self.limit.clamp(1, MAX_PAGE_LIMIT);
        (skip, limit)
    }
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username must be 3-32 lowercase alphanumeric characters (dots, dashes, underscores allowed)"
                .to_string(),
        );
    }
    Ok(())
}

pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        if p.is_empty() {
            return Ok(()); // Empty string treated as no phone
        }
        if !PHONE_REGEX.is_match(p) {
            return Err("Invalid phone number format".to_string());
        }
    }
    Ok(())
}

/// Validate an RFC3339 timestamp field (article dates, appointment slots)
pub fn validate_datetime(value: &str, field_name: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if DateTime::parse_from_rfc3339(value).is_err() {
        return Err(format!("Invalid {} format, expected RFC3339", field_name));
    }
    Ok(())
}

pub fn validate_article_status(status: &str) -> Result<(), String> {
    if !article_status::ALL.contains(&status) {
        return Err(format!(
            "Invalid status. Must be one of: {}",
            article_status::ALL.join(", ")
        ));
    }
    Ok(())
}

pub fn validate_appointment_status(status: &str) -> Result<(), String> {
    if !appointment_status::ALL.contains(&status) {
        return Err(format!(
            "Invalid status. Must be one of: {}",
            appointment_status::ALL.join(", ")
        ));
    }
    Ok(())
}

/// Validate a non-empty free-text field with a length cap
pub fn validate_text(value: &str, field_name: &str, max_len: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if value.len() > max_len {
        return Err(format!(
            "{} is too long (max {} characters)",
            field_name, max_len
        ));
    }
    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }
    Ok(())
}
