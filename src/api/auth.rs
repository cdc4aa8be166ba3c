//! Authentication endpoints and request extractors.
//!
//! Access tokens are verified statelessly; refresh tokens are looked up
//! server-side and rotated on every use. All verification failures
//! collapse to a single 401 so callers cannot probe which check failed.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Form, Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, TOKEN_KIND_ADMIN, TOKEN_KIND_USER};
use crate::config::Config;
use crate::db::{
    Admin, DbPool, ForgotPasswordRequest, LoginForm, MessageResponse, PasswordResetToken,
    RefreshRequest, RefreshToken, ResetPasswordRequest, SignupRequest, TokenPairResponse,
    User, UserResponse,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password, validate_phone};

const RESET_TOKEN_MINUTES: i64 = 60;

fn unauthenticated() -> ApiError {
    ApiError::unauthorized("Could not validate credentials")
}

/// Extract the bearer token from request headers
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// Best-effort client metadata for session records.
fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.to_string());
    (ip, user_agent)
}

/// Resolve an access token to an active user account.
pub async fn get_current_user(pool: &DbPool, config: &Config, token: &str) -> Result<User, ApiError> {
    let claims = auth::verify_access_token(token, TOKEN_KIND_USER, config.auth.signing_secret())
        .map_err(|_| unauthenticated())?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&claims.sub)
        .fetch_optional(pool)
        .await?;

    user.filter(|u| u.is_active).ok_or_else(unauthenticated)
}

/// Resolve an access token to an active admin account.
pub async fn get_current_admin(
    pool: &DbPool,
    config: &Config,
    token: &str,
) -> Result<Admin, ApiError> {
    let claims = auth::verify_access_token(token, TOKEN_KIND_ADMIN, config.auth.signing_secret())
        .map_err(|_| unauthenticated())?;

    let admin: Option<Admin> = sqlx::query_as("SELECT * FROM admins WHERE id = ?")
        .bind(&claims.sub)
        .fetch_optional(pool)
        .await?;

    admin.filter(|a| a.is_active).ok_or_else(unauthenticated)
}

/// Extractor for the authenticated patient account
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers).ok_or_else(unauthenticated)?;
        let user = get_current_user(&state.db, &state.config, &token).await?;
        Ok(AuthUser(user))
    }
}

/// Extractor for the authenticated admin account
pub struct AuthAdmin(pub Admin);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers).ok_or_else(unauthenticated)?;
        let admin = get_current_admin(&state.db, &state.config, &token).await?;
        Ok(AuthAdmin(admin))
    }
}

/// Issue an access/refresh pair for an account and persist the refresh
/// token digest.
pub(super) async fn issue_token_pair(
    state: &AppState,
    subject: &str,
    kind: &str,
) -> Result<TokenPairResponse, ApiError> {
    let access_token = auth::issue_access_token(
        subject,
        kind,
        state.config.auth.signing_secret(),
        state.config.auth.access_token_minutes,
    )
    .map_err(|e| {
        tracing::error!("Failed to sign access token: {}", e);
        ApiError::internal("Failed to issue token")
    })?;

    let refresh_token = auth::generate_opaque_token();
    let (user_id, admin_id) = if kind == TOKEN_KIND_USER {
        (Some(subject), None)
    } else {
        (None, Some(subject))
    };
    let expires_at =
        (Utc::now() + Duration::days(state.config.auth.refresh_token_days)).to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, token_hash, user_id, admin_id, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(auth::hash_token(&refresh_token))
    .bind(user_id)
    .bind(admin_id)
    .bind(&expires_at)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
    })
}

/// Record a login session with client metadata. Sessions are an audit
/// trail, not consulted for request auth; a failed insert must not turn
/// a successful login into an error.
pub(super) async fn record_session(state: &AppState, table: &str, owner_id: &str, headers: &HeaderMap) {
    let (ip, user_agent) = client_meta(headers);
    let expires_at =
        (Utc::now() + Duration::days(state.config.auth.refresh_token_days)).to_rfc3339();
    let owner_column = if table == "admin_sessions" {
        "admin_id"
    } else {
        "user_id"
    };

    let sql = format!(
        "INSERT INTO {} (id, {}, token_hash, expires_at, ip_address, user_agent, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        table, owner_column
    );
    let result = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(owner_id)
        .bind(auth::hash_token(&auth::generate_opaque_token()))
        .bind(&expires_at)
        .bind(ip)
        .bind(user_agent)
        .bind(Utc::now().to_rfc3339())
        .execute(&state.db)
        .await;

    if let Err(e) = result {
        tracing::warn!("Failed to record {} entry: {}", table, e);
    }
}

fn validate_signup(req: &SignupRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    errors.finish()
}

/// Create a patient account
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_signup(&req)?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }

    let password_hash = auth::hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create account")
    })?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, phone, password_hash, is_active, email_verified,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.email)
    .bind(&req.name)
    .bind(&req.phone)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!("New patient account registered: {}", user.email);
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Patient login (form-encoded, `username` carries the email)
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&form.username)
        .fetch_optional(&state.db)
        .await?;

    let user = user
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("Incorrect email or password"))?;

    if !auth::verify_password(&form.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Incorrect email or password"));
    }

    let pair = issue_token_pair(&state, &user.id, TOKEN_KIND_USER).await?;
    record_session(&state, "user_sessions", &user.id, &headers).await;

    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    Ok(Json(pair))
}

/// Exchange a refresh token for a new pair. The presented token is
/// revoked in the same transaction that records its replacement, so a
/// stolen token replays at most once.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid or expired refresh token");

    let presented: Option<RefreshToken> =
        sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_hash = ?")
            .bind(auth::hash_token(&req.refresh_token))
            .fetch_optional(&state.db)
            .await?;

    let presented = presented.filter(|t| t.is_usable()).ok_or_else(invalid)?;

    // Resolve the owning account; inactive accounts fail like unknown tokens.
    let (subject, kind) = if let Some(user_id) = &presented.user_id {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
        let user = user.filter(|u| u.is_active).ok_or_else(invalid)?;
        (user.id, TOKEN_KIND_USER)
    } else if let Some(admin_id) = &presented.admin_id {
        let admin: Option<Admin> = sqlx::query_as("SELECT * FROM admins WHERE id = ?")
            .bind(admin_id)
            .fetch_optional(&state.db)
            .await?;
        let admin = admin.filter(|a| a.is_active).ok_or_else(invalid)?;
        (admin.id, TOKEN_KIND_ADMIN)
    } else {
        return Err(invalid());
    };

    let access_token = auth::issue_access_token(
        &subject,
        kind,
        state.config.auth.signing_secret(),
        state.config.auth.access_token_minutes,
    )
    .map_err(|e| {
        tracing::error!("Failed to sign access token: {}", e);
        ApiError::internal("Failed to issue token")
    })?;

    let refresh_token = auth::generate_opaque_token();
    let (user_id, admin_id) = if kind == TOKEN_KIND_USER {
        (Some(subject.as_str()), None)
    } else {
        (None, Some(subject.as_str()))
    };
    let now = Utc::now().to_rfc3339();
    let expires_at =
        (Utc::now() + Duration::days(state.config.auth.refresh_token_days)).to_rfc3339();

    let mut tx = state.db.begin().await?;
    // The conditional revoke is the single-use gate: if another request
    // consumed this token between the lookup and here, zero rows change
    // and this presentation fails like any other invalid token.
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET is_revoked = 1, revoked_at = ? WHERE id = ? AND is_revoked = 0",
    )
    .bind(&now)
    .bind(&presented.id)
    .execute(&mut *tx)
    .await?;
    if revoked.rows_affected() == 0 {
        return Err(invalid());
    }
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, token_hash, user_id, admin_id, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(auth::hash_token(&refresh_token))
    .bind(user_id)
    .bind(admin_id)
    .bind(&expires_at)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
    }))
}

/// Revoke a refresh token. Always reports success so the endpoint never
/// reveals whether the presented token was valid.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Json<MessageResponse> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET is_revoked = 1, revoked_at = ? WHERE token_hash = ? AND is_revoked = 0",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(auth::hash_token(&req.refresh_token))
    .execute(&state.db)
    .await;

    if let Err(e) = result {
        tracing::debug!("Best-effort logout revocation failed: {}", e);
    }

    Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    })
}

/// Current patient profile
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Start a password reset. The response is identical whether or not the
/// account exists.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_email(&req.email) {
        return Err(ApiError::validation_field("email", e));
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;

    if let Some(user) = user.filter(|u| u.is_active) {
        let token = auth::generate_opaque_token();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, email, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user.email)
        .bind(auth::hash_token(&token))
        .bind((now + Duration::minutes(RESET_TOKEN_MINUTES)).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&state.db)
        .await?;

        // Delivery happens out of band; the token is never part of the
        // HTTP response.
        tracing::info!("Password reset token created for {}", user.email);
    }

    Ok(Json(MessageResponse {
        message: "If the account exists, a password reset link has been sent".to_string(),
    }))
}

/// Complete a password reset with a single-use token
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_password(&req.new_password) {
        return Err(ApiError::validation_field("new_password", e));
    }

    let invalid = || ApiError::bad_request("Invalid or expired reset token");

    let reset: Option<PasswordResetToken> =
        sqlx::query_as("SELECT * FROM password_reset_tokens WHERE token_hash = ?")
            .bind(auth::hash_token(&req.token))
            .fetch_optional(&state.db)
            .await?;

    let reset = reset.filter(|t| t.is_usable()).ok_or_else(invalid)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&reset.email)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(invalid)?;

    let password_hash = auth::hash_password(&req.new_password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to reset password")
    })?;

    let now = Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE password_reset_tokens SET is_used = 1, used_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&reset.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Password reset completed for {}", user.email);
    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}
