// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{AppState, AppointmentStore, UserDirectory};
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::clock::Clock;
use shared_models::user::{Actor, Role, UserAccount};

use crate::models::{AppointmentError, BookAppointmentRequest, UpdateAppointmentRequest};
use crate::services::slot::SlotValidator;

/// State machine over appointments, with role checks per transition.
///
/// ```text
/// PENDING --approve--> BOOKED --complete--> COMPLETED
///    |                   |
///    +------cancel-------+-----------------> CANCELLED
/// ```
///
/// A patient editing a BOOKED appointment sends it back to PENDING.
/// Every transition is written only if the stored record still equals the
/// copy it was decided from, so of two racing writes only the first lands.
pub struct AppointmentLifecycleService {
    appointments: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    validator: SlotValidator,
}

impl AppointmentLifecycleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            appointments: state.appointments.clone(),
            directory: state.directory.clone(),
            clock: state.clock.clone(),
            validator: SlotValidator::from_state(state),
        }
    }

    /// Create a PENDING appointment for the calling patient.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        actor: Actor,
    ) -> Result<Appointment, AppointmentError> {
        debug!(%actor, doctor_id = %request.doctor_id, time = %request.appointment_time, "booking appointment");

        self.find_user(request.patient_id, Role::Patient).await?;

        if actor != Actor::Patient(request.patient_id) {
            warn!(%actor, patient_id = %request.patient_id, "booking on behalf of another patient refused");
            return Err(AppointmentError::AccessDenied("Patient can only book for himself".to_string()));
        }

        self.find_user(request.doctor_id, Role::Doctor).await?;
        self.validator.validate(request.appointment_time, request.doctor_id).await?;

        let appointment = Appointment::new_pending(request.doctor_id, request.patient_id, request.appointment_time);
        let saved = self.appointments.save(appointment).await?;

        info!(appointment_id = %saved.id, doctor_id = %saved.doctor_id, "appointment booked");
        Ok(saved)
    }

    /// Edit the time and/or counterpart of an open appointment.
    ///
    /// Each party may swap the *other* party for an existing user of the
    /// matching role, never itself. A new time, or a new doctor, is
    /// re-validated against the doctor that ends up owning the appointment.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        actor: Actor,
    ) -> Result<Appointment, AppointmentError> {
        let read = self.find_appointment(appointment_id).await?;
        let mut appointment = read.clone();

        if !appointment.status.is_active() {
            return Err(AppointmentError::InvalidState(
                "Only Pending or Booked appointments can be updated".to_string(),
            ));
        }

        let mut doctor_changed = false;
        match actor {
            Actor::Patient(patient_id) => {
                if patient_id != appointment.patient_id {
                    return Err(denied(&actor, appointment_id));
                }
                if request.patient_id.is_some_and(|id| id != patient_id) {
                    warn!(%actor, %appointment_id, "patient tried to reassign appointment");
                    return Err(AppointmentError::AccessDenied(
                        "Patient cannot change the patient of an appointment".to_string(),
                    ));
                }
                if let Some(doctor_id) = request.doctor_id.filter(|id| *id != appointment.doctor_id) {
                    self.find_user(doctor_id, Role::Doctor).await?;
                    appointment.doctor_id = doctor_id;
                    doctor_changed = true;
                }
            }
            Actor::Doctor(doctor_id) => {
                if doctor_id != appointment.doctor_id {
                    return Err(denied(&actor, appointment_id));
                }
                if request.doctor_id.is_some_and(|id| id != doctor_id) {
                    warn!(%actor, %appointment_id, "doctor tried to hand over appointment");
                    return Err(AppointmentError::AccessDenied(
                        "Doctor cannot change the doctor of an appointment".to_string(),
                    ));
                }
                if let Some(patient_id) = request.patient_id.filter(|id| *id != appointment.patient_id) {
                    self.find_user(patient_id, Role::Patient).await?;
                    appointment.patient_id = patient_id;
                }
            }
        }

        if let Some(time) = request.appointment_time {
            appointment.appointment_time = time;
        }
        if request.appointment_time.is_some() || doctor_changed {
            self.validator
                .validate_excluding(appointment.appointment_time, appointment.doctor_id, Some(appointment.id))
                .await?;
        }

        if matches!(actor, Actor::Patient(_)) && appointment.status == AppointmentStatus::Booked {
            debug!(%appointment_id, "patient edit returns appointment to PENDING");
            appointment.status = AppointmentStatus::Pending;
        }

        let saved = self.appointments.save_if_unchanged(appointment, &read).await?;
        info!(%appointment_id, %actor, status = %saved.status, "appointment updated");
        Ok(saved)
    }

    pub async fn cancel_appointment(&self, appointment_id: Uuid, actor: Actor) -> Result<(), AppointmentError> {
        let mut appointment = self.find_appointment(appointment_id).await?;

        if !appointment.status.is_active() {
            return Err(AppointmentError::InvalidState(format!(
                "Appointment cannot be cancelled (status = {})",
                appointment.status
            )));
        }

        if !is_party(&appointment, &actor) {
            return Err(denied(&actor, appointment_id));
        }

        let read = appointment.clone();
        appointment.status = AppointmentStatus::Cancelled;
        self.appointments.save_if_unchanged(appointment, &read).await?;

        info!(%appointment_id, %actor, "appointment cancelled");
        Ok(())
    }

    /// PENDING -> BOOKED, by the appointment's doctor, while still ahead.
    pub async fn approve_appointment(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.find_appointment(appointment_id).await?;

        if actor != Actor::Doctor(appointment.doctor_id) {
            return Err(denied(&actor, appointment_id));
        }

        if appointment.status != AppointmentStatus::Pending {
            return Err(AppointmentError::InvalidState(
                "Cannot approve appointment that is not PENDING".to_string(),
            ));
        }

        if appointment.appointment_time <= self.clock.now() {
            return Err(AppointmentError::InvalidTime(
                "Cannot approve an appointment in the past".to_string(),
            ));
        }

        let read = appointment.clone();
        appointment.status = AppointmentStatus::Booked;
        let saved = self.appointments.save_if_unchanged(appointment, &read).await?;

        info!(%appointment_id, %actor, "appointment approved");
        Ok(saved)
    }

    /// BOOKED -> COMPLETED, by the appointment's doctor, once its time came.
    pub async fn complete_appointment(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.find_appointment(appointment_id).await?;

        if actor != Actor::Doctor(appointment.doctor_id) {
            return Err(denied(&actor, appointment_id));
        }

        if appointment.status != AppointmentStatus::Booked {
            return Err(AppointmentError::InvalidState(
                "Can't complete a not BOOKED appointment".to_string(),
            ));
        }

        if appointment.appointment_time > self.clock.now() {
            return Err(AppointmentError::InvalidTime(
                "Cannot mark an appointment as completed before its time".to_string(),
            ));
        }

        let read = appointment.clone();
        appointment.status = AppointmentStatus::Completed;
        let saved = self.appointments.save_if_unchanged(appointment, &read).await?;

        info!(%appointment_id, %actor, "appointment completed");
        Ok(saved)
    }

    /// The caller's own appointments, ascending by time.
    pub async fn list_for_caller(
        &self,
        actor: Actor,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = match (actor, status) {
            (Actor::Patient(id), None) => self.appointments.find_by_patient_id(id).await?,
            (Actor::Patient(id), Some(status)) => self.appointments.find_by_patient_id_and_status(id, status).await?,
            (Actor::Doctor(id), None) => self.appointments.find_by_doctor_id(id).await?,
            (Actor::Doctor(id), Some(status)) => self.appointments.find_by_doctor_id_and_status(id, status).await?,
        };

        debug!(%actor, count = appointments.len(), "listed appointments");
        Ok(appointments)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, AppointmentError> {
        let appointment = self.find_appointment(appointment_id).await?;

        if !is_party(&appointment, &actor) {
            return Err(denied(&actor, appointment_id));
        }

        Ok(appointment)
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment not found".to_string()))
    }

    async fn find_user(&self, id: Uuid, role: Role) -> Result<UserAccount, AppointmentError> {
        self.directory.find_by_id_and_role(id, role).await?.ok_or_else(|| {
            let label = match role {
                Role::Doctor => "Doctor",
                Role::Patient => "Patient",
                Role::Admin | Role::Pharmacy => "User",
            };
            AppointmentError::NotFound(format!("{} not found", label))
        })
    }
}

fn is_party(appointment: &Appointment, actor: &Actor) -> bool {
    match actor {
        Actor::Patient(id) => *id == appointment.patient_id,
        Actor::Doctor(id) => *id == appointment.doctor_id,
    }
}

fn denied(actor: &Actor, appointment_id: Uuid) -> AppointmentError {
    warn!(%actor, %appointment_id, "caller is not allowed to act on appointment");
    AppointmentError::AccessDenied("You are not a party to this appointment".to_string())
}
