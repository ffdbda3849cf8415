// libs/appointment-cell/src/services/slot.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{AppState, AppointmentStore};
use shared_models::clock::Clock;
use shared_models::schedule::{is_slot_aligned, is_within_working_hours, slot_end};

use crate::models::{AppointmentError, CONFLICT_MESSAGE};

/// Temporal rules for a candidate appointment start.
///
/// Rules run in order and the first failure wins: future start, working
/// hours, top-of-hour alignment, then the doctor's existing bookings.
pub struct SlotValidator {
    appointments: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
}

impl SlotValidator {
    pub fn new(appointments: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { appointments, clock }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.appointments.clone(), state.clock.clone())
    }

    pub async fn validate(&self, start: NaiveDateTime, doctor_id: Uuid) -> Result<(), AppointmentError> {
        self.validate_excluding(start, doctor_id, None).await
    }

    /// Same as [`validate`](Self::validate), ignoring the appointment `exclude`
    /// when looking for overlaps.
    pub async fn validate_excluding(
        &self,
        start: NaiveDateTime,
        doctor_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        debug!(%doctor_id, %start, "validating appointment slot");

        if start <= self.clock.now() {
            return Err(AppointmentError::InvalidTime("must be in the future".to_string()));
        }

        if !is_within_working_hours(start) {
            return Err(AppointmentError::InvalidTime("outside working hours".to_string()));
        }

        if !is_slot_aligned(start) {
            return Err(AppointmentError::InvalidTime("must start at top of hour".to_string()));
        }

        let taken = self
            .appointments
            .exists_overlapping(doctor_id, start, slot_end(start), exclude)
            .await?;
        if taken {
            warn!(%doctor_id, %start, "slot already taken");
            return Err(AppointmentError::Conflict(CONFLICT_MESSAGE.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveDate};
    use shared_database::MemoryAppointmentStore;
    use shared_models::appointment::{Appointment, AppointmentStatus};
    use shared_models::clock::FixedClock;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 16).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    fn validator(store: Arc<MemoryAppointmentStore>) -> SlotValidator {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap().and_hms_opt(8, 0, 0).unwrap());
        SlotValidator::new(store, Arc::new(clock))
    }

    #[tokio::test]
    async fn accepts_free_aligned_slot() {
        let validator = validator(Arc::new(MemoryAppointmentStore::new()));
        assert_eq!(validator.validate(at(10, 0), Uuid::new_v4()).await, Ok(()));
    }

    #[tokio::test]
    async fn last_slot_of_day_is_bookable() {
        let validator = validator(Arc::new(MemoryAppointmentStore::new()));
        assert_eq!(validator.validate(at(20, 0), Uuid::new_v4()).await, Ok(()));
    }

    #[tokio::test]
    async fn twenty_oh_one_fails_working_hours_before_alignment() {
        // Both rules are violated; the working-hours rule runs first.
        let validator = validator(Arc::new(MemoryAppointmentStore::new()));
        assert_eq!(
            validator.validate(at(20, 1), Uuid::new_v4()).await,
            Err(AppointmentError::InvalidTime("outside working hours".to_string()))
        );
    }

    #[tokio::test]
    async fn misaligned_inside_hours_is_rejected() {
        let validator = validator(Arc::new(MemoryAppointmentStore::new()));
        assert_eq!(
            validator.validate(at(10, 30), Uuid::new_v4()).await,
            Err(AppointmentError::InvalidTime("must start at top of hour".to_string()))
        );
    }

    #[tokio::test]
    async fn closing_hour_and_early_morning_are_outside_hours() {
        let validator = validator(Arc::new(MemoryAppointmentStore::new()));
        for start in [at(21, 0), at(8, 0), at(8, 59)] {
            assert_eq!(
                validator.validate(start, Uuid::new_v4()).await,
                Err(AppointmentError::InvalidTime("outside working hours".to_string()))
            );
        }
    }

    #[tokio::test]
    async fn past_time_fails_before_other_rules() {
        let validator = validator(Arc::new(MemoryAppointmentStore::new()));
        let yesterday = at(3, 17) - Duration::days(2);
        assert_eq!(
            validator.validate(yesterday, Uuid::new_v4()).await,
            Err(AppointmentError::InvalidTime("must be in the future".to_string()))
        );
    }

    #[tokio::test]
    async fn sub_second_offset_is_misaligned() {
        let validator = validator(Arc::new(MemoryAppointmentStore::new()));
        let start = at(11, 0) + Duration::milliseconds(250);
        assert_eq!(
            validator.validate(start, Uuid::new_v4()).await,
            Err(AppointmentError::InvalidTime("must start at top of hour".to_string()))
        );
    }

    #[tokio::test]
    async fn active_booking_conflicts_and_cancelled_does_not() {
        let store = Arc::new(MemoryAppointmentStore::new());
        let doctor = Uuid::new_v4();
        let booked = store.save(Appointment::new_pending(doctor, Uuid::new_v4(), at(14, 0))).await.unwrap();

        let validator = validator(store.clone());
        assert_matches!(validator.validate(at(14, 0), doctor).await, Err(AppointmentError::Conflict(_)));
        assert_eq!(validator.validate(at(14, 0), Uuid::new_v4()).await, Ok(()));
        assert_eq!(validator.validate(at(15, 0), doctor).await, Ok(()));

        let mut cancelled = booked.clone();
        cancelled.status = AppointmentStatus::Cancelled;
        store.save(cancelled).await.unwrap();
        assert_eq!(validator.validate(at(14, 0), doctor).await, Ok(()));
    }

    #[tokio::test]
    async fn excluded_appointment_does_not_conflict_with_itself() {
        let store = Arc::new(MemoryAppointmentStore::new());
        let doctor = Uuid::new_v4();
        let booked = store.save(Appointment::new_pending(doctor, Uuid::new_v4(), at(14, 0))).await.unwrap();

        let validator = validator(store);
        assert_eq!(validator.validate_excluding(at(14, 0), doctor, Some(booked.id)).await, Ok(()));
    }
}
