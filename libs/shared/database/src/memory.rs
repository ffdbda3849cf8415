use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::schedule::slot_end;
use shared_models::user::{Role, UserAccount};

use crate::store::{AppointmentStore, StoreError, UserDirectory};

/// Process-local appointment table.
///
/// Every write takes the table's write lock, so the overlap check in `save`
/// and the write itself cannot interleave with another booking.
#[derive(Debug, Default)]
pub struct MemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        let appointments = self.appointments.read().await;
        let mut selected: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| predicate(appointment))
            .cloned()
            .collect();
        selected.sort_by_key(|appointment| (appointment.appointment_time, appointment.id));
        selected
    }

    /// Overlap check plus insert; the caller holds the write guard.
    fn write_locked(
        appointments: &mut HashMap<Uuid, Appointment>,
        appointment: Appointment,
    ) -> Result<Appointment, StoreError> {
        if appointment.status.is_active() {
            if let Some(existing) = appointments
                .values()
                .find(|existing| existing.collides_with(&appointment))
            {
                warn!(
                    "Rejecting appointment {}: overlaps {} for doctor {}",
                    appointment.id, existing.id, appointment.doctor_id
                );
                return Err(StoreError::SlotTaken {
                    doctor_id: appointment.doctor_id,
                    start: appointment.appointment_time,
                });
            }
        }

        appointments.insert(appointment.id, appointment.clone());
        debug!("Saved appointment {} ({})", appointment.id, appointment.status);
        Ok(appointment)
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn save(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        Self::write_locked(&mut appointments, appointment)
    }

    async fn save_if_unchanged(
        &self,
        appointment: Appointment,
        read: &Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        if appointments.get(&read.id) != Some(read) {
            warn!("Rejecting stale write to appointment {}", read.id);
            return Err(StoreError::Stale { id: read.id });
        }

        Self::write_locked(&mut appointments, appointment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_by_doctor_id(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.select(|a| a.doctor_id == doctor_id).await)
    }

    async fn find_by_patient_id(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.select(|a| a.patient_id == patient_id).await)
    }

    async fn find_by_doctor_id_and_status(
        &self,
        doctor_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.select(|a| a.doctor_id == doctor_id && a.status == status).await)
    }

    async fn find_by_patient_id_and_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.select(|a| a.patient_id == patient_id && a.status == status).await)
    }

    async fn exists_overlapping(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let appointments = self.appointments.read().await;
        Ok(appointments.values().any(|a| {
            a.doctor_id == doctor_id
                && Some(a.id) != exclude
                && a.status.is_active()
                && a.appointment_time < end
                && slot_end(a.appointment_time) > start
        }))
    }

    async fn find_for_doctor_excluding_status(
        &self,
        doctor_id: Uuid,
        excluded: AppointmentStatus,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self
            .select(|a| {
                a.doctor_id == doctor_id
                    && a.status != excluded
                    && a.appointment_time >= start
                    && a.appointment_time < end
            })
            .await)
    }
}

/// Process-local user directory, listing users in insertion order.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<UserAccount>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserAccount>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Load a JSON array of users, e.g. `[{"id": "...", "name": "...",
    /// "email": "...", "role": "DOCTOR"}]`.
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading directory seed {}", path.display()))?;
        let users: Vec<UserAccount> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing directory seed {}", path.display()))?;
        info!("Loaded {} users from {}", users.len(), path.display());
        Ok(Self::with_users(users))
    }

    /// Add a user, replacing any existing entry with the same id.
    pub async fn insert(&self, user: UserAccount) {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|existing| existing.id == user.id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_id_and_role(&self, id: Uuid, role: Role) -> Result<Option<UserAccount>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id && u.role == role).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<UserAccount>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| u.role == role).cloned().collect())
    }
}
