//! Database seeders for first-run data: the bootstrap admin account and
//! the doctor directory.

use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::AuthConfig;

/// Permission set granted to the bootstrap admin.
const FULL_PERMISSIONS: &str = r#"{"news":["create","read","update","delete"],"appointments":["create","read","update","delete"],"users":["read","update","delete"]}"#;

const SAMPLE_DOCTORS: [(&str, &str, &str); 3] = [
    ("Dr. John Smith", "Cardiology", "john.smith@hospital.com"),
    ("Dr. Sarah Johnson", "Pediatrics", "sarah.johnson@hospital.com"),
    ("Dr. Michael Chen", "Neurology", "michael.chen@hospital.com"),
];

pub async fn seed_defaults(pool: &SqlitePool, auth: &AuthConfig) -> Result<()> {
    ensure_default_admin(pool, auth).await?;
    seed_doctors(pool).await?;
    Ok(())
}

/// Create the bootstrap admin when no admin account exists yet.
async fn ensure_default_admin(pool: &SqlitePool, auth: &AuthConfig) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    let password_hash = hash_password(&auth.admin_password)
        .map_err(|e| anyhow!("failed to hash bootstrap admin password: {e}"))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO admins (id, username, email, password_hash, role, permissions,
                            is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'admin', ?, 1, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&auth.admin_username)
    .bind(&auth.admin_email)
    .bind(&password_hash)
    .bind(FULL_PERMISSIONS)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!("Created bootstrap admin account '{}'", auth.admin_username);
    if auth.admin_password == "admin123" {
        warn!("Bootstrap admin uses the default password, change it before going live");
    }

    Ok(())
}

/// Populate the doctor directory on an empty database.
async fn seed_doctors(pool: &SqlitePool) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctors")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    for (name, specialty, email) in SAMPLE_DOCTORS {
        sqlx::query(
            "INSERT INTO doctors (id, name, specialty, email, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(specialty)
        .bind(email)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    info!("Seeded doctor directory");
    Ok(())
}
