//! Shared fixtures for unit tests.

use crate::domains::consultation::types::{Consultation, ConsultationStatus};
use crate::domains::message::types::Message;
use crate::domains::report::types::{HealthReport, ReportStatus, Urgency};
use crate::domains::user::types::User;
use crate::store::RecordStore;
use crate::types::{SenderKind, UserRole};
use chrono::Utc;
use std::sync::Arc;

/// Fresh in-memory record store with the schema applied.
pub async fn test_store() -> Arc<RecordStore> {
    let pool = crate::database::connect_in_memory().await.unwrap();
    crate::db_migration::initialize_database(&pool).await.unwrap();
    Arc::new(RecordStore::new(pool))
}

pub fn sample_user(id: &str, role: UserRole) -> User {
    User {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        full_name: format!("User {}", id),
        phone_number: "+91-9876543210".to_string(),
        role,
        created_at: Utc::now(),
        village: matches!(role, UserRole::Villager).then(|| "Rampur".to_string()),
        specialization: matches!(role, UserRole::Doctor).then(|| "General Medicine".to_string()),
        license_number: matches!(role, UserRole::Doctor).then(|| "MED12345".to_string()),
        gender: None,
        date_of_birth: None,
        address: None,
        medical_history: None,
    }
}

pub fn sample_report(id: &str, owner_id: &str, urgency: Urgency) -> HealthReport {
    HealthReport {
        id: id.to_string(),
        user_id: owner_id.to_string(),
        symptoms: "fever".to_string(),
        description: "since yesterday".to_string(),
        urgency,
        status: ReportStatus::Pending,
        location: None,
        created_at: Utc::now(),
        responses: Vec::new(),
        assigned_doctor_id: None,
        assigned_doctor_name: None,
    }
}

pub fn sample_consultation(report_id: &str, doctor_id: &str, patient_id: &str) -> Consultation {
    let now = Utc::now();
    Consultation {
        id: Consultation::deterministic_id(report_id, doctor_id),
        report_id: report_id.to_string(),
        doctor_id: doctor_id.to_string(),
        doctor_name: "Dr. Rao".to_string(),
        patient_id: patient_id.to_string(),
        patient_name: "Anita".to_string(),
        status: ConsultationStatus::Active,
        created_at: now,
        started_at: now,
        updated_at: now,
        last_message: None,
        responses: Vec::new(),
    }
}

pub fn sample_message(id: &str, consultation_id: &str, sender_id: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        consultation_id: consultation_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_name: format!("User {}", sender_id),
        role: if sender_id.starts_with('d') {
            SenderKind::Doctor
        } else {
            SenderKind::Patient
        },
        content: content.to_string(),
        timestamp: Utc::now(),
    }
}
