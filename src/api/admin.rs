//! Admin console endpoints: login, profile, user administration and
//! dashboard statistics.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::auth::{self, TOKEN_KIND_ADMIN};
use crate::db::{
    appointment_status, article_status, Admin, AdminLoginRequest, AdminResponse, AdminStatistics,
    PaginatedUsers, TokenPairResponse, UpdateAdminProfileRequest, UpdateUserRequest, User,
    UserResponse,
};
use crate::AppState;

use super::auth::{issue_token_pair, record_session, AuthAdmin};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_email, validate_name, validate_password, validate_phone, validate_uuid, Pagination,
};

/// Admin login (JSON body, unlike the form-encoded patient login)
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let admin: Option<Admin> = sqlx::query_as("SELECT * FROM admins WHERE username = ?")
        .bind(&req.username)
        .fetch_optional(&state.db)
        .await?;

    let admin = admin
        .filter(|a| a.is_active)
        .ok_or_else(|| ApiError::unauthorized("Incorrect username or password"))?;

    if !auth::verify_password(&req.password, &admin.password_hash) {
        return Err(ApiError::unauthorized("Incorrect username or password"));
    }

    let pair = issue_token_pair(&state, &admin.id, TOKEN_KIND_ADMIN).await?;
    record_session(&state, "admin_sessions", &admin.id, &headers).await;

    sqlx::query("UPDATE admins SET last_login = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(&admin.id)
        .execute(&state.db)
        .await?;

    tracing::info!("Admin {} logged in", admin.username);
    Ok(Json(pair))
}

/// Current admin profile
pub async fn get_profile(AuthAdmin(admin): AuthAdmin) -> Json<AdminResponse> {
    Json(admin.into())
}

/// Update the calling admin's own email or password
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Json(req): Json<UpdateAdminProfileRequest>,
) -> Result<Json<AdminResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref email) = req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    if let Some(ref password) = req.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", e);
        }
    }
    errors.finish()?;

    if let Some(ref email) = req.email {
        let taken: Option<Admin> = sqlx::query_as("SELECT * FROM admins WHERE email = ? AND id != ?")
            .bind(email)
            .bind(&admin.id)
            .fetch_optional(&state.db)
            .await?;
        if taken.is_some() {
            return Err(ApiError::bad_request("Email already in use"));
        }
    }

    let password_hash = match &req.password {
        Some(password) => Some(auth::hash_password(password).map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            ApiError::internal("Failed to update profile")
        })?),
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE admins SET
            email = COALESCE(?, email),
            password_hash = COALESCE(?, password_hash),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.email)
    .bind(&password_hash)
    .bind(Utc::now().to_rfc3339())
    .bind(&admin.id)
    .execute(&state.db)
    .await?;

    let updated: Admin = sqlx::query_as("SELECT * FROM admins WHERE id = ?")
        .bind(&admin.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(updated.into()))
}

/// Paginated user roster
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Query(page): Query<Pagination>,
) -> Result<Json<PaginatedUsers>, ApiError> {
    if !admin.allows("users", "read") {
        return Err(ApiError::forbidden("Not permitted to read user accounts"));
    }

    let (skip, limit) = page.clamped();

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(PaginatedUsers {
        total: total.0,
        items: users.into_iter().map(UserResponse::from).collect(),
        skip,
        limit,
    }))
}

/// Admin-side partial update of a user account (name, phone, active flag)
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if !admin.allows("users", "update") {
        return Err(ApiError::forbidden("Not permitted to update user accounts"));
    }
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref name) = req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }
    errors.finish()?;

    let updated = sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            phone = COALESCE(?, phone),
            is_active = COALESCE(?, is_active),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.phone)
    .bind(req.is_active)
    .bind(Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(user.into()))
}

/// Hard-delete a user account
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !admin.allows("users", "delete") {
        return Err(ApiError::forbidden("Not permitted to delete user accounts"));
    }
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("User {} deleted by admin {}", id, admin.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Dashboard counters
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    AuthAdmin(_admin): AuthAdmin,
) -> Result<Json<AdminStatistics>, ApiError> {
    let total_articles: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news_articles")
        .fetch_one(&state.db)
        .await?;
    let published_articles: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM news_articles WHERE status = ?")
            .bind(article_status::PUBLISHED)
            .fetch_one(&state.db)
            .await?;
    let draft_articles: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM news_articles WHERE status = ?")
            .bind(article_status::DRAFT)
            .fetch_one(&state.db)
            .await?;
    let total_views: (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(views_count), 0) FROM news_articles")
            .fetch_one(&state.db)
            .await?;
    let total_users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    let total_appointments: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appointments")
        .fetch_one(&state.db)
        .await?;
    let pending_appointments: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM appointments WHERE status = ?")
            .bind(appointment_status::PENDING)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(AdminStatistics {
        total_articles: total_articles.0,
        published_articles: published_articles.0,
        draft_articles: draft_articles.0,
        total_views: total_views.0,
        total_users: total_users.0,
        total_appointments: total_appointments.0,
        pending_appointments: pending_appointments.0,
    }))
}
