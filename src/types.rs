use serde::{Deserialize, Serialize};

// Re-export UserRole and Permission from the permission module
pub use crate::domains::permission::{Permission, UserRole};

/// Side of a consultation a message or summary originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    Doctor,
    Patient,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::Doctor => "doctor",
            SenderKind::Patient => "patient",
        }
    }

    pub fn from_role(role: UserRole) -> Self {
        match role {
            UserRole::Doctor => SenderKind::Doctor,
            _ => SenderKind::Patient,
        }
    }
}
