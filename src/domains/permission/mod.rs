use serde::{Deserialize, Serialize};

// --- User Role Definition ---

/// UserRole enum for authorization in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Villager,
    Doctor,
    Admin,
}

// --- Permission Enum Definition ---

/// Permission enum representing individual permissions in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    // User management
    ManageUsers,

    // Health report permissions
    SubmitReport,
    ViewOwnReports,
    ViewAllReports,
    RespondToReport,
    AppointDoctor,
    DeleteOwnReport,
    DeleteAppointment,

    // Consultation / messaging permissions
    ViewConsultations,
    SendMessage,

    // System permissions
    ViewSystemStats,
}

// --- UserRole Implementation ---

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Villager => "villager",
            UserRole::Doctor => "doctor",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "villager" => Some(UserRole::Villager),
            "doctor" => Some(UserRole::Doctor),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// Check if the user has a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        match self {
            UserRole::Admin => {
                match permission {
                    // Admins observe the system; they do not take part in the
                    // report/consultation flow themselves.
                    Permission::SubmitReport
                    | Permission::RespondToReport
                    | Permission::AppointDoctor
                    | Permission::DeleteOwnReport
                    | Permission::DeleteAppointment => false,

                    _ => true,
                }
            }
            UserRole::Doctor => match permission {
                Permission::ViewAllReports
                | Permission::RespondToReport
                | Permission::DeleteAppointment
                | Permission::ViewConsultations
                | Permission::SendMessage => true,

                _ => false,
            },
            UserRole::Villager => match permission {
                Permission::SubmitReport
                | Permission::ViewOwnReports
                | Permission::AppointDoctor
                | Permission::DeleteOwnReport
                | Permission::ViewConsultations
                | Permission::SendMessage => true,

                _ => false,
            },
        }
    }

    /// Check if the user has all of the given permissions
    pub fn has_permissions(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::Villager, UserRole::Doctor, UserRole::Admin] {
            assert_eq!(UserRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::from_str("nurse"), None);
    }

    #[test]
    fn test_role_permissions() {
        assert!(UserRole::Villager.has_permission(Permission::SubmitReport));
        assert!(!UserRole::Villager.has_permission(Permission::RespondToReport));
        assert!(UserRole::Doctor.has_permission(Permission::RespondToReport));
        assert!(!UserRole::Doctor.has_permission(Permission::AppointDoctor));
        assert!(UserRole::Admin.has_permission(Permission::ManageUsers));
        assert!(!UserRole::Admin.has_permission(Permission::SubmitReport));
    }
}
