// libs/doctor-cell/src/models.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

/// Free slot starts of one doctor for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorAvailability {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub available_times: Vec<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub day: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AvailabilityError {
    #[error("{0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for AvailabilityError {
    fn from(err: StoreError) -> Self {
        AvailabilityError::Store(err.to_string())
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::NotFound(msg) => AppError::NotFound(msg),
            AvailabilityError::Store(msg) => AppError::Internal(msg),
        }
    }
}
