//! News article models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub mod article_status {
    pub const DRAFT: &str = "draft";
    pub const PUBLISHED: &str = "published";

    pub const ALL: [&str; 2] = [DRAFT, PUBLISHED];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub image_url: String,
    /// Display date of the article, distinct from created_at.
    pub date: String,
    pub status: String,
    pub views_count: i64,
    pub published_at: Option<String>,
    pub admin_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub image_url: String,
    pub date: String,
    /// Defaults to draft when omitted.
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedArticles {
    pub total: i64,
    pub items: Vec<NewsArticle>,
    pub skip: i64,
    pub limit: i64,
}
