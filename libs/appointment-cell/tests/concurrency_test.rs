use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use tokio::sync::Barrier;
use uuid::Uuid;

use appointment_cell::{
    AppointmentError, AppointmentLifecycleService, BookAppointmentRequest, UpdateAppointmentRequest,
};
use shared_database::{AppState, AppointmentStore, MemoryAppointmentStore, StoreError};
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::user::Actor;
use shared_utils::test_utils::{TestState, TestUser};

fn slot(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 1, 16).unwrap().and_hms_opt(hour, 0, 0).unwrap()
}

/// Memory store that holds every `find_by_id` caller until all racers have
/// read, so each of them decides from the same stored status.
struct LockstepReads {
    inner: Arc<MemoryAppointmentStore>,
    readers: Barrier,
}

#[async_trait]
impl AppointmentStore for LockstepReads {
    async fn save(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        self.inner.save(appointment).await
    }

    async fn save_if_unchanged(
        &self,
        appointment: Appointment,
        read: &Appointment,
    ) -> Result<Appointment, StoreError> {
        self.inner.save_if_unchanged(appointment, read).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let found = self.inner.find_by_id(id).await;
        self.readers.wait().await;
        found
    }

    async fn find_by_doctor_id(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.inner.find_by_doctor_id(doctor_id).await
    }

    async fn find_by_patient_id(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.inner.find_by_patient_id(patient_id).await
    }

    async fn find_by_doctor_id_and_status(
        &self,
        doctor_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.find_by_doctor_id_and_status(doctor_id, status).await
    }

    async fn find_by_patient_id_and_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.find_by_patient_id_and_status(patient_id, status).await
    }

    async fn exists_overlapping(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        self.inner.exists_overlapping(doctor_id, start, end, exclude).await
    }

    async fn find_for_doctor_excluding_status(
        &self,
        doctor_id: Uuid,
        excluded: AppointmentStatus,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner
            .find_for_doctor_excluding_status(doctor_id, excluded, start, end)
            .await
    }
}

struct Race {
    state: Arc<AppState>,
    store: Arc<MemoryAppointmentStore>,
    appointment: Appointment,
    doctor: Actor,
    patient: Actor,
}

/// A PENDING appointment behind a store whose reads wait for two callers.
async fn pending_race() -> Race {
    let test_state = TestState::new();
    let doctor = TestUser::doctor("Perry Cox");
    let patient = TestUser::patient("Carla Espinosa");
    test_state.add_user(&doctor).await;
    test_state.add_user(&patient).await;

    let store = Arc::new(MemoryAppointmentStore::new());
    let appointment = store
        .save(Appointment::new_pending(doctor.id, patient.id, slot(10)))
        .await
        .unwrap();

    let lockstep = Arc::new(LockstepReads {
        inner: Arc::clone(&store),
        readers: Barrier::new(2),
    });
    let state = Arc::new(AppState::new(
        test_state.config.clone(),
        lockstep,
        test_state.directory.clone(),
        test_state.clock.clone(),
    ));

    Race {
        state,
        store,
        appointment,
        doctor: Actor::Doctor(doctor.id),
        patient: Actor::Patient(patient.id),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_racing_approve_keeps_exactly_one_outcome() {
    let race = pending_race().await;
    let id = race.appointment.id;

    let cancel = {
        let state = Arc::clone(&race.state);
        let patient = race.patient;
        tokio::spawn(async move { AppointmentLifecycleService::new(&state).cancel_appointment(id, patient).await })
    };
    let approve = {
        let state = Arc::clone(&race.state);
        let doctor = race.doctor;
        tokio::spawn(async move { AppointmentLifecycleService::new(&state).approve_appointment(id, doctor).await })
    };

    let cancelled = cancel.await.unwrap();
    let approved = approve.await.unwrap();
    let stored = race.store.find_by_id(id).await.unwrap().unwrap().status;

    match (cancelled, approved) {
        (Ok(()), Err(AppointmentError::InvalidState(_))) => assert_eq!(stored, AppointmentStatus::Cancelled),
        (Err(AppointmentError::InvalidState(_)), Ok(booked)) => {
            assert_eq!(booked.status, AppointmentStatus::Booked);
            assert_eq!(stored, AppointmentStatus::Booked);
        }
        other => panic!("expected exactly one transition to land, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn patient_edit_racing_approve_is_not_lost() {
    let race = pending_race().await;
    let id = race.appointment.id;

    let edit = {
        let state = Arc::clone(&race.state);
        let patient = race.patient;
        tokio::spawn(async move {
            AppointmentLifecycleService::new(&state)
                .update_appointment(
                    id,
                    UpdateAppointmentRequest {
                        appointment_time: Some(slot(12)),
                        ..Default::default()
                    },
                    patient,
                )
                .await
        })
    };
    let approve = {
        let state = Arc::clone(&race.state);
        let doctor = race.doctor;
        tokio::spawn(async move { AppointmentLifecycleService::new(&state).approve_appointment(id, doctor).await })
    };

    let edited = edit.await.unwrap();
    let approved = approve.await.unwrap();
    let stored = race.store.find_by_id(id).await.unwrap().unwrap();

    match (edited, approved) {
        (Ok(moved), Err(AppointmentError::InvalidState(_))) => {
            assert_eq!(stored, moved);
            assert_eq!(stored.status, AppointmentStatus::Pending);
            assert_eq!(stored.appointment_time, slot(12));
        }
        (Err(AppointmentError::InvalidState(_)), Ok(booked)) => {
            assert_eq!(stored, booked);
            assert_eq!(stored.appointment_time, slot(10));
        }
        other => panic!("expected exactly one write to land, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bookings_of_one_slot_admit_exactly_one() {
    let state = TestState::new();
    let doctor = TestUser::doctor("Derek Shepherd");
    state.add_user(&doctor).await;

    let mut patients = Vec::new();
    for n in 0..12 {
        let patient = TestUser::patient(&format!("Patient {}", n));
        state.add_user(&patient).await;
        patients.push(patient);
    }

    let app_state = state.app_state();
    let slot = NaiveDate::from_ymd_opt(2030, 1, 16).unwrap().and_hms_opt(15, 0, 0).unwrap();

    let attempts = patients.iter().map(|patient| {
        let app_state = Arc::clone(&app_state);
        let request = BookAppointmentRequest {
            doctor_id: doctor.id,
            patient_id: patient.id,
            appointment_time: slot,
        };
        let actor = Actor::Patient(patient.id);
        tokio::spawn(async move {
            AppointmentLifecycleService::new(&app_state)
                .book_appointment(request, actor)
                .await
        })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("booking task panicked"))
        .collect();

    let booked = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(AppointmentError::Conflict(_))))
        .count();
    assert_eq!(booked, 1);
    assert_eq!(conflicts, patients.len() - 1);

    let stored = state
        .appointments
        .find_by_doctor_id_and_status(doctor.id, AppointmentStatus::Pending)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}
