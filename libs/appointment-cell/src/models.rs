// libs/appointment-cell/src/models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::error::AppError;

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: NaiveDateTime,
}

/// Partial edit of an appointment; absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub appointment_time: Option<NaiveDateTime>,
}

/// Appointment as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl From<Appointment> for AppointmentRecord {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            appointment_time: appointment.appointment_time,
            status: appointment.status,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

pub const CONFLICT_MESSAGE: &str = "doctor already booked at this time";
pub const STALE_MESSAGE: &str = "Appointment was changed by another request";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment conflict: {0}")]
    Conflict(String),

    #[error("Invalid appointment state: {0}")]
    InvalidState(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotTaken { .. } => AppointmentError::Conflict(CONFLICT_MESSAGE.to_string()),
            StoreError::Stale { .. } => AppointmentError::InvalidState(STALE_MESSAGE.to_string()),
            other => AppointmentError::Store(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::AccessDenied(msg) => AppError::Forbidden(msg),
            AppointmentError::InvalidTime(msg) => AppError::BadRequest(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::InvalidState(msg) => AppError::InvalidState(msg),
            AppointmentError::Store(msg) => AppError::Internal(msg),
        }
    }
}
