use crate::types::SenderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a consultation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Active,
    Scheduled,
    Completed,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Active => "active",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Completed => "completed",
        }
    }
}

/// Summary of the most recent exchange, shown in consultation lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender: SenderKind,
}

/// Response copy embedded in a consultation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationResponse {
    pub doctor_id: String,
    pub doctor_name: String,
    pub advice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<String>,
    pub responded_at: DateTime<Utc>,
}

/// A consultation between one patient and one appointed doctor, spawned from
/// a report appointment. Mirrored into both parties' collections; the id is
/// deterministic so re-appointing the same doctor cannot create a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: String,
    pub report_id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub patient_id: String,
    pub patient_name: String,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub responses: Vec<ConsultationResponse>,
}

impl Consultation {
    /// Deterministic id for the (report, doctor) pair.
    pub fn deterministic_id(report_id: &str, doctor_id: &str) -> String {
        format!("consultation_{}_{}", report_id, doctor_id)
    }

    /// Materialize a consultation from an appointment, seeded with the chosen
    /// doctor response as the opening exchange.
    pub fn from_appointment(
        report: &crate::domains::report::types::HealthReport,
        response: &crate::domains::report::types::DoctorResponse,
        patient_name: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Self::deterministic_id(&report.id, &response.doctor_id),
            report_id: report.id.clone(),
            doctor_id: response.doctor_id.clone(),
            doctor_name: response.doctor_name.clone(),
            patient_id: report.user_id.clone(),
            patient_name: patient_name.to_string(),
            status: ConsultationStatus::Active,
            created_at: now,
            started_at: now,
            updated_at: response.responded_at,
            last_message: Some(LastMessage {
                content: response.advice.clone(),
                timestamp: response.responded_at,
                sender: SenderKind::Doctor,
            }),
            responses: vec![ConsultationResponse {
                doctor_id: response.doctor_id.clone(),
                doctor_name: response.doctor_name.clone(),
                advice: response.advice.clone(),
                prescription: response.prescription.clone(),
                responded_at: response.responded_at,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_id() {
        assert_eq!(
            Consultation::deterministic_id("r1", "d1"),
            "consultation_r1_d1"
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConsultationStatus::Active).unwrap(),
            "\"active\""
        );
    }
}
