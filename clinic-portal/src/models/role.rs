//! Clinic roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role attribute stored on a user's profile row.
///
/// Declared from lowest to highest privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Staff,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Patient, Role::Doctor, Role::Staff, Role::Admin];

    /// Substituted when a role cannot be resolved. Never grants more than a patient has.
    pub const LOWEST_PRIVILEGE: Role = Role::Patient;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Dashboard a user with this role lands on after signing in.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Patient => "/patient",
            Role::Doctor => "/doctor",
            Role::Staff => "/staff",
            Role::Admin => "/admin",
        }
    }

    /// Human-readable label for page headings.
    pub fn title(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Staff => "Staff",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
