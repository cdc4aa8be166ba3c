//! Appointment models and DTOs.
//!
//! Appointments are never hard-deleted: cancellation flips the status to
//! `cancelled` and keeps the row.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub mod appointment_status {
    pub const PENDING: &str = "pending";
    pub const CONFIRMED: &str = "confirmed";
    pub const CANCELLED: &str = "cancelled";
    pub const COMPLETED: &str = "completed";

    pub const ALL: [&str; 4] = [PENDING, CONFIRMED, CANCELLED, COMPLETED];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: String,
    pub user_id: String,
    pub doctor_id: Option<String>,
    pub date: String,
    pub reason: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub date: String,
    pub reason: String,
    pub notes: Option<String>,
    pub doctor_id: Option<String>,
}

/// Patient-side partial update; status changes go through cancellation
/// or the admin routes.
#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Admin-side partial update.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateAppointmentRequest {
    pub date: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub doctor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignDoctorRequest {
    pub doctor_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedAppointments {
    pub total: i64,
    pub items: Vec<Appointment>,
    pub skip: i64,
    pub limit: i64,
}
