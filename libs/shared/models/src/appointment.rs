use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::schedule::{slot_end, slots_overlap};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Pending,
    Booked,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Pending and booked appointments hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Booked)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "PENDING"),
            AppointmentStatus::Booked => write!(f, "BOOKED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "BOOKED" => Ok(AppointmentStatus::Booked),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            other => Err(format!("unknown appointment status: {}", other)),
        }
    }
}

/// Persisted appointment row. One fixed-length slot starting at
/// `appointment_time`, in clinic local time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn new_pending(doctor_id: Uuid, patient_id: Uuid, appointment_time: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            appointment_time,
            status: AppointmentStatus::Pending,
        }
    }

    pub fn end_time(&self) -> NaiveDateTime {
        slot_end(self.appointment_time)
    }

    /// True when both hold a slot for the same doctor at overlapping times.
    pub fn collides_with(&self, other: &Appointment) -> bool {
        self.id != other.id
            && self.doctor_id == other.doctor_id
            && self.status.is_active()
            && other.status.is_active()
            && slots_overlap(self.appointment_time, other.appointment_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ten_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 2).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_string(&AppointmentStatus::Booked).unwrap(), "\"BOOKED\"");
        assert_eq!("cancelled".parse::<AppointmentStatus>(), Ok(AppointmentStatus::Cancelled));
    }

    #[test]
    fn only_active_appointments_collide() {
        let doctor = Uuid::new_v4();
        let first = Appointment::new_pending(doctor, Uuid::new_v4(), ten_am());
        let mut second = Appointment::new_pending(doctor, Uuid::new_v4(), ten_am() + Duration::minutes(30));
        assert!(first.collides_with(&second));

        second.status = AppointmentStatus::Cancelled;
        assert!(!first.collides_with(&second));

        second.status = AppointmentStatus::Booked;
        second.doctor_id = Uuid::new_v4();
        assert!(!first.collides_with(&second));
    }

    #[test]
    fn an_appointment_never_collides_with_itself() {
        let appointment = Appointment::new_pending(Uuid::new_v4(), Uuid::new_v4(), ten_am());
        assert!(!appointment.collides_with(&appointment.clone()));
        assert_eq!(appointment.end_time(), ten_am() + Duration::hours(1));
    }
}
