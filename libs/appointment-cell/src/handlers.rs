// libs/appointment-cell/src/handlers.rs
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::user::{Actor, Role};

use crate::models::{AppointmentRecord, BookAppointmentRequest, UpdateAppointmentRequest};
use crate::services::{resolve_actor, AppointmentLifecycleService};

async fn caller(state: &AppState, user: &User) -> Result<Actor, AppError> {
    Ok(resolve_actor(state.directory.as_ref(), user).await?)
}

/// Resolve the caller and insist on the role a listing route serves.
async fn caller_with_role(state: &AppState, user: &User, role: Role) -> Result<Actor, AppError> {
    let actor = caller(state, user).await?;
    if actor.role() != role {
        return Err(AppError::Forbidden(format!("{} role required", role)));
    }
    Ok(actor)
}

fn parse_status(raw: &str) -> Result<AppointmentStatus, AppError> {
    AppointmentStatus::from_str(raw).map_err(AppError::BadRequest)
}

fn records(appointments: Vec<Appointment>) -> Vec<AppointmentRecord> {
    appointments.into_iter().map(AppointmentRecord::from).collect()
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentRecord>), AppError> {
    let actor = caller(&state, &user).await?;
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.book_appointment(request, actor).await?;
    Ok((StatusCode::CREATED, Json(appointment.into())))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentRecord>, AppError> {
    let actor = caller(&state, &user).await?;
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.get_appointment(appointment_id, actor).await?;
    Ok(Json(appointment.into()))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<AppointmentRecord>, AppError> {
    let actor = caller(&state, &user).await?;
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.update_appointment(appointment_id, request, actor).await?;
    Ok(Json(appointment.into()))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let actor = caller(&state, &user).await?;
    let service = AppointmentLifecycleService::new(&state);

    service.cancel_appointment(appointment_id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentRecord>, AppError> {
    let actor = caller(&state, &user).await?;
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.approve_appointment(appointment_id, actor).await?;
    Ok(Json(appointment.into()))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<AppointmentRecord>, AppError> {
    let actor = caller(&state, &user).await?;
    let service = AppointmentLifecycleService::new(&state);

    let appointment = service.complete_appointment(appointment_id, actor).await?;
    Ok(Json(appointment.into()))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentRecord>>, AppError> {
    let actor = caller_with_role(&state, &user, Role::Patient).await?;
    let service = AppointmentLifecycleService::new(&state);

    Ok(Json(records(service.list_for_caller(actor, None).await?)))
}

#[axum::debug_handler]
pub async fn get_patient_appointments_by_status(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentRecord>>, AppError> {
    let actor = caller_with_role(&state, &user, Role::Patient).await?;
    let status = parse_status(&status)?;
    let service = AppointmentLifecycleService::new(&state);

    Ok(Json(records(service.list_for_caller(actor, Some(status)).await?)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentRecord>>, AppError> {
    let actor = caller_with_role(&state, &user, Role::Doctor).await?;
    let service = AppointmentLifecycleService::new(&state);

    Ok(Json(records(service.list_for_caller(actor, None).await?)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments_by_status(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentRecord>>, AppError> {
    let actor = caller_with_role(&state, &user, Role::Doctor).await?;
    let status = parse_status(&status)?;
    let service = AppointmentLifecycleService::new(&state);

    Ok(Json(records(service.list_for_caller(actor, Some(status)).await?)))
}
