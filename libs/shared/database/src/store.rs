use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::user::{Role, UserAccount};

#[derive(Error, Debug)]
pub enum StoreError {
    /// An active appointment of the same doctor already overlaps this slot.
    #[error("slot {start} already taken for doctor {doctor_id}")]
    SlotTaken {
        doctor_id: Uuid,
        start: NaiveDateTime,
    },

    /// A conditional write found the record missing or different from the
    /// copy the caller read.
    #[error("appointment {id} was changed by another writer")]
    Stale { id: Uuid },

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("malformed record: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Persistence for appointment records.
///
/// `save` is an upsert keyed by `id` and is the only write path. For active
/// appointments it must refuse, atomically with the write, any record that
/// would overlap another active appointment of the same doctor, returning
/// [`StoreError::SlotTaken`].
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn save(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Overwrite an existing appointment only while the stored record still
    /// equals `read`; otherwise [`StoreError::Stale`]. The comparison, the
    /// overlap check and the write happen as one step.
    async fn save_if_unchanged(
        &self,
        appointment: Appointment,
        read: &Appointment,
    ) -> Result<Appointment, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn find_by_doctor_id(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn find_by_patient_id(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn find_by_doctor_id_and_status(
        &self,
        doctor_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn find_by_patient_id_and_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Whether an active appointment of the doctor overlaps `[start, end)`,
    /// ignoring the appointment with id `exclude`.
    async fn exists_overlapping(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError>;

    /// Appointments of the doctor starting in `[start, end)` whose status is
    /// not `excluded`, ascending by time.
    async fn find_for_doctor_excluding_status(
        &self,
        doctor_id: Uuid,
        excluded: AppointmentStatus,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;
}

/// Read-only lookup of clinic users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError>;

    async fn find_by_id_and_role(&self, id: Uuid, role: Role) -> Result<Option<UserAccount>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;

    /// All users holding `role`, in the directory's listing order.
    async fn find_by_role(&self, role: Role) -> Result<Vec<UserAccount>, StoreError>;
}
