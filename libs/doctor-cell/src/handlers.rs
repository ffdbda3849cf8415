// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use uuid::Uuid;

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{AvailabilityQuery, DoctorAvailability};
use crate::services::AvailabilityService;

fn required_day(query: AvailabilityQuery) -> Result<NaiveDate, AppError> {
    query
        .day
        .ok_or_else(|| AppError::BadRequest("Query parameter 'day' (YYYY-MM-DD) is required".to_string()))
}

#[axum::debug_handler]
pub async fn get_available_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<DoctorAvailability>>, AppError> {
    let day = required_day(query)?;
    let service = AvailabilityService::new(&state);

    Ok(Json(service.all_doctors_availability(day).await?))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<DoctorAvailability>, AppError> {
    let day = required_day(query)?;
    let service = AvailabilityService::new(&state);

    Ok(Json(service.compute_availability(doctor_id, day).await?))
}
