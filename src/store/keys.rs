//! Storage key composers.
//!
//! Every persisted collection is addressed by one of these keys. The key is
//! the only ownership boundary in the store: `reports_<userId>` belongs to
//! that villager by convention, nothing enforces it.

use crate::types::UserRole;

/// Global collection of every health report, visible to doctors and admins.
pub const ALL_REPORTS: &str = "allReports";

/// Admin-facing user directory (session-synced activity flags live here).
pub const USERS: &str = "users";

/// Registered accounts, including password hashes.
pub const REGISTERED_USERS: &str = "registeredUsers";

/// The currently logged-in user for this store.
pub const CURRENT_USER: &str = "currentUser";

/// Legacy role-wide monitoring watermark (used when no doctor id is known).
pub const LAST_NOTIFICATION_CHECK: &str = "lastNotificationCheck";

/// Per-owner mirror of a villager's own reports.
pub fn reports(user_id: &str) -> String {
    format!("reports_{}", user_id)
}

/// A patient's consultation collection.
pub fn consultations(user_id: &str) -> String {
    format!("consultations_{}", user_id)
}

/// A doctor's consultation collection.
pub fn doctor_consultations(doctor_id: &str) -> String {
    format!("consultations_doctor_{}", doctor_id)
}

/// Append-only chat history of one consultation.
pub fn messages(consultation_id: &str) -> String {
    format!("messages_{}", consultation_id)
}

/// Per-user persisted notification list.
pub fn notifications(user_id: &str) -> String {
    format!("notifications_{}", user_id)
}

/// Per-(role, user) set of report ids soft-deleted from that user's view.
pub fn hidden_reports(role: UserRole, user_id: &str) -> String {
    format!("hiddenReports_{}_{}", role.as_str(), user_id)
}

/// Per-doctor monitoring watermark.
pub fn last_doctor_check(doctor_id: &str) -> String {
    format!("lastDoctorNotificationCheck_{}", doctor_id)
}

/// Per-patient monitoring watermark.
pub fn last_patient_check(patient_id: &str) -> String {
    format!("lastPatientNotificationCheck_{}", patient_id)
}
