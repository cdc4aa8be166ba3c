//! Public doctor directory.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db::Doctor;
use crate::AppState;

use super::error::ApiError;

pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let doctors = sqlx::query_as::<_, Doctor>("SELECT * FROM doctors ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(doctors))
}
