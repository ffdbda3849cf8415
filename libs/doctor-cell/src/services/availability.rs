// libs/doctor-cell/src/services/availability.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use tracing::debug;
use uuid::Uuid;

use shared_database::{AppState, AppointmentStore, UserDirectory};
use shared_models::appointment::AppointmentStatus;
use shared_models::clock::Clock;
use shared_models::schedule::{slot_starts, working_day};
use shared_models::user::{Role, UserAccount};

use crate::models::{AvailabilityError, DoctorAvailability};

/// Derives free one-hour slots from the doctor's existing bookings.
pub struct AvailabilityService {
    appointments: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            appointments: state.appointments.clone(),
            directory: state.directory.clone(),
            clock: state.clock.clone(),
        }
    }

    pub async fn compute_availability(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<DoctorAvailability, AvailabilityError> {
        let doctor = self
            .directory
            .find_by_id_and_role(doctor_id, Role::Doctor)
            .await?
            .ok_or_else(|| AvailabilityError::NotFound("Doctor not found".to_string()))?;

        self.availability_for(doctor, day).await
    }

    /// Availability of every doctor, in directory listing order.
    pub async fn all_doctors_availability(&self, day: NaiveDate) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        let doctors = self.directory.find_by_role(Role::Doctor).await?;
        debug!(%day, doctors = doctors.len(), "computing availability for all doctors");

        join_all(doctors.into_iter().map(|doctor| self.availability_for(doctor, day)))
            .await
            .into_iter()
            .collect()
    }

    async fn availability_for(
        &self,
        doctor: UserAccount,
        day: NaiveDate,
    ) -> Result<DoctorAvailability, AvailabilityError> {
        let (day_start, day_end) = working_day(day);
        let taken: HashSet<NaiveDateTime> = self
            .appointments
            .find_for_doctor_excluding_status(doctor.id, AppointmentStatus::Cancelled, day_start, day_end)
            .await?
            .into_iter()
            .map(|appointment| appointment.appointment_time)
            .collect();

        let now = self.clock.now();
        let available_times: Vec<NaiveDateTime> = slot_starts(day)
            .filter(|slot| *slot > now && !taken.contains(slot))
            .collect();

        debug!(doctor_id = %doctor.id, %day, free = available_times.len(), "computed availability");
        Ok(DoctorAvailability {
            doctor_id: doctor.id,
            doctor_name: doctor.name,
            available_times,
        })
    }
}
