//! News article endpoints: the public feed and the admin editorial CRUD.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    article_status, CreateArticleRequest, NewsArticle, PaginatedArticles, UpdateArticleRequest,
};
use crate::AppState;

use super::auth::AuthAdmin;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_article_status, validate_datetime, validate_text, validate_uuid, Pagination,
};

fn validate_create_request(req: &CreateArticleRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_text(&req.title, "Title", 200) {
        errors.add("title", e);
    }
    if let Err(e) = validate_text(&req.summary, "Summary", 500) {
        errors.add("summary", e);
    }
    if let Err(e) = validate_text(&req.content, "Content", 50_000) {
        errors.add("content", e);
    }
    if let Err(e) = validate_text(&req.category, "Category", 50) {
        errors.add("category", e);
    }
    if let Err(e) = validate_text(&req.image_url, "Image URL", 2048) {
        errors.add("image_url", e);
    }
    if let Err(e) = validate_datetime(&req.date, "date") {
        errors.add("date", e);
    }
    if let Some(ref status) = req.status {
        if let Err(e) = validate_article_status(status) {
            errors.add("status", e);
        }
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateArticleRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        if let Err(e) = validate_text(title, "Title", 200) {
            errors.add("title", e);
        }
    }
    if let Some(ref summary) = req.summary {
        if let Err(e) = validate_text(summary, "Summary", 500) {
            errors.add("summary", e);
        }
    }
    if let Some(ref content) = req.content {
        if let Err(e) = validate_text(content, "Content", 50_000) {
            errors.add("content", e);
        }
    }
    if let Some(ref category) = req.category {
        if let Err(e) = validate_text(category, "Category", 50) {
            errors.add("category", e);
        }
    }
    if let Some(ref image_url) = req.image_url {
        if let Err(e) = validate_text(image_url, "Image URL", 2048) {
            errors.add("image_url", e);
        }
    }
    if let Some(ref date) = req.date {
        if let Err(e) = validate_datetime(date, "date") {
            errors.add("date", e);
        }
    }
    if let Some(ref status) = req.status {
        if let Err(e) = validate_article_status(status) {
            errors.add("status", e);
        }
    }

    errors.finish()
}

/// Public feed: published articles, newest first
pub async fn list_news(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<NewsArticle>>, ApiError> {
    let (skip, limit) = page.clamped();

    let articles = sqlx::query_as::<_, NewsArticle>(
        "SELECT * FROM news_articles WHERE status = ? ORDER BY date DESC LIMIT ? OFFSET ?",
    )
    .bind(article_status::PUBLISHED)
    .bind(limit)
    .bind(skip)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(articles))
}

/// Public article fetch. Counts the view before reading the row, so each
/// successful fetch increments views_count by exactly one; drafts are
/// invisible here.
pub async fn get_news(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NewsArticle>, ApiError> {
    if let Err(e) = validate_uuid(&id, "article_id") {
        return Err(ApiError::validation_field("article_id", e));
    }

    let counted =
        sqlx::query("UPDATE news_articles SET views_count = views_count + 1 WHERE id = ? AND status = ?")
            .bind(&id)
            .bind(article_status::PUBLISHED)
            .execute(&state.db)
            .await?;

    if counted.rows_affected() == 0 {
        return Err(ApiError::not_found("Article not found"));
    }

    let article = sqlx::query_as::<_, NewsArticle>("SELECT * FROM news_articles WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(article))
}

/// Editorial list including drafts, with a total for pagination controls
pub async fn admin_list_news(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Query(page): Query<Pagination>,
) -> Result<Json<PaginatedArticles>, ApiError> {
    if !admin.allows("news", "read") {
        return Err(ApiError::forbidden("Not permitted to read news articles"));
    }

    let (skip, limit) = page.clamped();

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news_articles")
        .fetch_one(&state.db)
        .await?;

    let items = sqlx::query_as::<_, NewsArticle>(
        "SELECT * FROM news_articles ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(PaginatedArticles {
        total: total.0,
        items,
        skip,
        limit,
    }))
}

/// Create an article, authored by the calling admin
pub async fn admin_create_news(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Json(req): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<NewsArticle>), ApiError> {
    if !admin.allows("news", "create") {
        return Err(ApiError::forbidden("Not permitted to create news articles"));
    }
    validate_create_request(&req)?;

    let status = req.status.as_deref().unwrap_or(article_status::DRAFT);
    let now = Utc::now().to_rfc3339();
    let published_at = (status == article_status::PUBLISHED).then(|| now.clone());
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO news_articles (id, title, summary, content, category, image_url, date,
                                   status, views_count, published_at, admin_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.title)
    .bind(&req.summary)
    .bind(&req.content)
    .bind(&req.category)
    .bind(&req.image_url)
    .bind(&req.date)
    .bind(status)
    .bind(&published_at)
    .bind(&admin.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let article = sqlx::query_as::<_, NewsArticle>("SELECT * FROM news_articles WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(article)))
}

/// Update an article. Allowed for the original author or an admin whose
/// permission set grants news updates.
pub async fn admin_update_news(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Path(id): Path<String>,
    Json(req): Json<UpdateArticleRequest>,
) -> Result<Json<NewsArticle>, ApiError> {
    if let Err(e) = validate_uuid(&id, "article_id") {
        return Err(ApiError::validation_field("article_id", e));
    }
    validate_update_request(&req)?;

    let existing = sqlx::query_as::<_, NewsArticle>("SELECT * FROM news_articles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    let is_author = existing.admin_id.as_deref() == Some(admin.id.as_str());
    if !is_author && !admin.allows("news", "update") {
        return Err(ApiError::forbidden("Not permitted to update this article"));
    }

    let now = Utc::now().to_rfc3339();
    // First transition into published stamps the publication time.
    let published_at = match (&req.status, &existing.published_at) {
        (Some(status), None) if status == article_status::PUBLISHED => Some(now.clone()),
        _ => existing.published_at.clone(),
    };

    sqlx::query(
        r#"
        UPDATE news_articles SET
            title = COALESCE(?, title),
            summary = COALESCE(?, summary),
            content = COALESCE(?, content),
            category = COALESCE(?, category),
            image_url = COALESCE(?, image_url),
            date = COALESCE(?, date),
            status = COALESCE(?, status),
            published_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.title)
    .bind(&req.summary)
    .bind(&req.content)
    .bind(&req.category)
    .bind(&req.image_url)
    .bind(&req.date)
    .bind(&req.status)
    .bind(&published_at)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let article = sqlx::query_as::<_, NewsArticle>("SELECT * FROM news_articles WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(article))
}

/// Hard-delete an article (author or permitted admin)
pub async fn admin_delete_news(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = validate_uuid(&id, "article_id") {
        return Err(ApiError::validation_field("article_id", e));
    }

    let existing = sqlx::query_as::<_, NewsArticle>("SELECT * FROM news_articles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    let is_author = existing.admin_id.as_deref() == Some(admin.id.as_str());
    if !is_author && !admin.allows("news", "delete") {
        return Err(ApiError::forbidden("Not permitted to delete this article"));
    }

    sqlx::query("DELETE FROM news_articles WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Distinct categories in use, for editorial filters
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
) -> Result<Json<Vec<String>>, ApiError> {
    if !admin.allows("news", "read") {
        return Err(ApiError::forbidden("Not permitted to read news articles"));
    }

    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT category FROM news_articles ORDER BY category")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(rows.into_iter().map(|(c,)| c).collect()))
}
