use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
    Pharmacy,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Doctor => write!(f, "DOCTOR"),
            Role::Patient => write!(f, "PATIENT"),
            Role::Pharmacy => write!(f, "PHARMACY"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "DOCTOR" => Ok(Role::Doctor),
            "PATIENT" => Ok(Role::Patient),
            "PHARMACY" => Ok(Role::Pharmacy),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A user as known to the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// The party on whose behalf a scheduling operation runs.
///
/// Only doctors and patients take part in appointments; every other role is
/// rejected when the caller is resolved, so the scheduling services never
/// see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Patient(Uuid),
    Doctor(Uuid),
}

impl Actor {
    pub fn from_account(account: &UserAccount) -> Option<Self> {
        match account.role {
            Role::Patient => Some(Actor::Patient(account.id)),
            Role::Doctor => Some(Actor::Doctor(account.id)),
            Role::Admin | Role::Pharmacy => None,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Actor::Patient(id) | Actor::Doctor(id) => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Patient(_) => Role::Patient,
            Actor::Doctor(_) => Role::Doctor,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role(), self.id())
    }
}
