//! Appointment scheduling endpoints.
//!
//! Patients manage their own appointments; admins see and manage all of
//! them. Cancellation keeps the row with status `cancelled`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    appointment_status, AdminUpdateAppointmentRequest, Appointment, AssignDoctorRequest,
    CreateAppointmentRequest, Doctor, PaginatedAppointments, UpdateAppointmentRequest,
};
use crate::AppState;

use super::auth::{AuthAdmin, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_appointment_status, validate_datetime, validate_text, validate_uuid, Pagination,
};

async fn doctor_exists(state: &AppState, doctor_id: &str) -> Result<(), ApiError> {
    let doctor: Option<Doctor> = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(doctor_id)
        .fetch_optional(&state.db)
        .await?;
    doctor
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request("Doctor not found"))
}

fn validate_create_request(req: &CreateAppointmentRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_datetime(&req.date, "date") {
        errors.add("date", e);
    }
    if let Err(e) = validate_text(&req.reason, "Reason", 500) {
        errors.add("reason", e);
    }
    if let Some(ref notes) = req.notes {
        if notes.len() > 2000 {
            errors.add("notes", "Notes are too long (max 2000 characters)");
        }
    }
    if let Some(ref doctor_id) = req.doctor_id {
        if let Err(e) = validate_uuid(doctor_id, "doctor_id") {
            errors.add("doctor_id", e);
        }
    }

    errors.finish()
}

fn validate_patient_update(req: &UpdateAppointmentRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref date) = req.date {
        if let Err(e) = validate_datetime(date, "date") {
            errors.add("date", e);
        }
    }
    if let Some(ref reason) = req.reason {
        if let Err(e) = validate_text(reason, "Reason", 500) {
            errors.add("reason", e);
        }
    }
    if let Some(ref notes) = req.notes {
        if notes.len() > 2000 {
            errors.add("notes", "Notes are too long (max 2000 characters)");
        }
    }

    errors.finish()
}

/// Book an appointment for the authenticated patient
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    validate_create_request(&req)?;
    if let Some(ref doctor_id) = req.doctor_id {
        doctor_exists(&state, doctor_id).await?;
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO appointments (id, user_id, doctor_id, date, reason, status, notes,
                                  created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.doctor_id)
    .bind(&req.date)
    .bind(&req.reason)
    .bind(appointment_status::PENDING)
    .bind(&req.notes)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!("Appointment {} booked by user {}", id, user.id);
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// List the patient's own appointments, most recent slot first
pub async fn list_my_appointments(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let appointments = sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE user_id = ? ORDER BY date DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(appointments))
}

/// Fetch one of the patient's own appointments
pub async fn get_my_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    if let Err(e) = validate_uuid(&id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }

    let appointment: Option<Appointment> =
        sqlx::query_as("SELECT * FROM appointments WHERE id = ? AND user_id = ?")
            .bind(&id)
            .bind(&user.id)
            .fetch_optional(&state.db)
            .await?;

    appointment
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Appointment not found"))
}

/// Patient-side partial update of an appointment they own
pub async fn update_my_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    if let Err(e) = validate_uuid(&id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }
    validate_patient_update(&req)?;

    let updated = sqlx::query(
        r#"
        UPDATE appointments SET
            date = COALESCE(?, date),
            reason = COALESCE(?, reason),
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&req.date)
    .bind(&req.reason)
    .bind(&req.notes)
    .bind(Utc::now().to_rfc3339())
    .bind(&id)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(appointment))
}

/// Cancel an appointment. Mapped to DELETE but the row survives with
/// status `cancelled`.
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    if let Err(e) = validate_uuid(&id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }

    let cancelled = sqlx::query(
        "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(appointment_status::CANCELLED)
    .bind(Utc::now().to_rfc3339())
    .bind(&id)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    if cancelled.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!("Appointment {} cancelled by user {}", id, user.id);
    Ok(Json(appointment))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Admin view over all appointments, optionally filtered by status
pub async fn admin_list_appointments(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<PaginatedAppointments>, ApiError> {
    if !admin.allows("appointments", "read") {
        return Err(ApiError::forbidden("Not permitted to read appointments"));
    }

    if let Some(ref status) = query.status {
        if let Err(e) = validate_appointment_status(status) {
            return Err(ApiError::validation_field("status", e));
        }
    }

    let (skip, limit) = Pagination {
        skip: query.skip.unwrap_or(0),
        limit: query.limit.unwrap_or(20),
    }
    .clamped();

    let (total, items) = if let Some(ref status) = query.status {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appointments WHERE status = ?")
            .bind(status)
            .fetch_one(&state.db)
            .await?;
        let items = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE status = ? ORDER BY date DESC LIMIT ? OFFSET ?",
        )
        .bind(status)
        .bind(limit)
        .bind(skip)
        .fetch_all(&state.db)
        .await?;
        (total.0, items)
    } else {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appointments")
            .fetch_one(&state.db)
            .await?;
        let items = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments ORDER BY date DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&state.db)
        .await?;
        (total.0, items)
    };

    Ok(Json(PaginatedAppointments {
        total,
        items,
        skip,
        limit,
    }))
}

/// Admin-side partial update, including status and doctor assignment
pub async fn admin_update_appointment(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Path(id): Path<String>,
    Json(req): Json<AdminUpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    if !admin.allows("appointments", "update") {
        return Err(ApiError::forbidden("Not permitted to update appointments"));
    }
    if let Err(e) = validate_uuid(&id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }

    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref date) = req.date {
        if let Err(e) = validate_datetime(date, "date") {
            errors.add("date", e);
        }
    }
    if let Some(ref reason) = req.reason {
        if let Err(e) = validate_text(reason, "Reason", 500) {
            errors.add("reason", e);
        }
    }
    if let Some(ref status) = req.status {
        if let Err(e) = validate_appointment_status(status) {
            errors.add("status", e);
        }
    }
    if let Some(ref doctor_id) = req.doctor_id {
        if let Err(e) = validate_uuid(doctor_id, "doctor_id") {
            errors.add("doctor_id", e);
        }
    }
    errors.finish()?;

    if let Some(ref doctor_id) = req.doctor_id {
        doctor_exists(&state, doctor_id).await?;
    }

    let updated = sqlx::query(
        r#"
        UPDATE appointments SET
            date = COALESCE(?, date),
            reason = COALESCE(?, reason),
            notes = COALESCE(?, notes),
            status = COALESCE(?, status),
            doctor_id = COALESCE(?, doctor_id),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.date)
    .bind(&req.reason)
    .bind(&req.notes)
    .bind(&req.status)
    .bind(&req.doctor_id)
    .bind(Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(appointment))
}

/// Assign a doctor to an appointment
pub async fn assign_doctor(
    State(state): State<Arc<AppState>>,
    AuthAdmin(admin): AuthAdmin,
    Path(id): Path<String>,
    Json(req): Json<AssignDoctorRequest>,
) -> Result<Json<Appointment>, ApiError> {
    if !admin.allows("appointments", "update") {
        return Err(ApiError::forbidden("Not permitted to update appointments"));
    }
    if let Err(e) = validate_uuid(&id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }
    if let Err(e) = validate_uuid(&req.doctor_id, "doctor_id") {
        return Err(ApiError::validation_field("doctor_id", e));
    }

    doctor_exists(&state, &req.doctor_id).await?;

    let updated =
        sqlx::query("UPDATE appointments SET doctor_id = ?, updated_at = ? WHERE id = ?")
            .bind(&req.doctor_id)
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(&state.db)
            .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(appointment))
}
