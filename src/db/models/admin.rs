//! Admin account models, roles and the per-admin permission set.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const EDITOR: &str = "editor";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    /// JSON map of resource name to allowed actions,
    /// e.g. `{"news": ["create", "read"]}`.
    pub permissions: Option<String>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Admin {
    pub fn permission_set(&self) -> HashMap<String, Vec<String>> {
        self.permissions
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Whether this admin may perform `action` on `resource`.
    /// The `admin` role is unrestricted; editors are gated by their
    /// permission set.
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        if self.role == roles::ADMIN {
            return true;
        }
        self.permission_set()
            .get(resource)
            .map(|actions| actions.iter().any(|a| a == action))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub permissions: Option<serde_json::Value>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Admin> for AdminResponse {
    fn from(admin: Admin) -> Self {
        let permissions = admin
            .permissions
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            id: admin.id,
            username: admin.username,
            email: admin.email,
            role: admin.role,
            permissions,
            is_active: admin.is_active,
            last_login: admin.last_login,
            created_at: admin.created_at,
            updated_at: admin.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdminProfileRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminStatistics {
    pub total_articles: i64,
    pub published_articles: i64,
    pub draft_articles: i64,
    pub total_views: i64,
    pub total_users: i64,
    pub total_appointments: i64,
    pub pending_appointments: i64,
}
