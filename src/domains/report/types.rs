use crate::errors::DomainResult;
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Urgency of a health report, highest first in doctor-facing listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Emergency => "emergency",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Urgency::Emergency => 4,
            Urgency::High => 3,
            Urgency::Medium => 2,
            Urgency::Low => 1,
        }
    }
}

/// Lifecycle status of a report. `reviewed` is only reached once at least one
/// doctor response exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Active,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Active => "active",
            ReportStatus::Resolved => "resolved",
        }
    }
}

/// Optional location attached to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A doctor's response to a report. Appended, never mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorResponse {
    pub id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub advice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<DateTime<Utc>>,
    pub responded_at: DateTime<Utc>,
}

/// Core HealthReport entity. Stored redundantly in the global collection and
/// the owner's per-user mirror; both are updated at every write site, never
/// transactionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub id: String,
    pub user_id: String,
    pub symptoms: String,
    #[serde(default)]
    pub description: String,
    pub urgency: Urgency,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ReportLocation>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub responses: Vec<DoctorResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_doctor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_doctor_name: Option<String>,
}

impl HealthReport {
    pub fn has_responses(&self) -> bool {
        !self.responses.is_empty()
    }

    pub fn has_response_from(&self, doctor_id: &str) -> bool {
        self.responses.iter().any(|r| r.doctor_id == doctor_id)
    }

    pub fn response_from(&self, doctor_id: &str) -> Option<&DoctorResponse> {
        self.responses.iter().find(|r| r.doctor_id == doctor_id)
    }
}

/// NewHealthReport DTO - used when a villager submits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHealthReport {
    pub symptoms: String,
    pub description: String,
    pub urgency: Urgency,
    pub location: Option<ReportLocation>,
}

impl Validate for NewHealthReport {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("symptoms", Some(self.symptoms.clone()))
            .required()
            .max_length(500)
            .validate()?;

        ValidationBuilder::new("description", Some(self.description.clone()))
            .max_length(2000)
            .validate()?;

        Ok(())
    }
}

/// ResponseInput DTO - used when a doctor responds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInput {
    pub advice: String,
    pub prescription: Option<String>,
    /// Days until follow-up; zero or absent means no follow-up.
    pub follow_up_days: Option<i64>,
}

impl Validate for ResponseInput {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("advice", Some(self.advice.clone()))
            .required()
            .max_length(2000)
            .validate()?;

        Ok(())
    }
}

/// Doctor/admin listing entry: the report enriched with submitter details
/// looked up from the user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportWithSubmitter {
    #[serde(flatten)]
    pub report: HealthReport,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_village: Option<String>,
}

/// System-wide counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_reports: usize,
    pub pending_reports: usize,
    pub reviewed_reports: usize,
    pub resolved_reports: usize,
    pub emergency_reports: usize,
    pub total_users: usize,
    pub active_users: usize,
    pub villagers: usize,
    pub doctors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Urgency::Emergency).unwrap(),
            "\"emergency\""
        );
    }

    #[test]
    fn test_urgency_ranking() {
        assert!(Urgency::Emergency.rank() > Urgency::High.rank());
        assert!(Urgency::High.rank() > Urgency::Medium.rank());
        assert!(Urgency::Medium.rank() > Urgency::Low.rank());
    }

    #[test]
    fn test_report_tolerates_missing_optional_fields() {
        // Shape written by older clients: no responses, no assignment.
        let raw = r#"{
            "id": "r1",
            "userId": "v1",
            "symptoms": "fever",
            "urgency": "high",
            "status": "pending",
            "createdAt": "2026-08-01T10:00:00Z"
        }"#;

        let report: HealthReport = serde_json::from_str(raw).unwrap();
        assert!(report.responses.is_empty());
        assert!(report.assigned_doctor_id.is_none());
        assert_eq!(report.description, "");
    }

    #[test]
    fn test_created_at_round_trips_as_rfc3339() {
        let raw = r#"{
            "id": "r1",
            "userId": "v1",
            "symptoms": "fever",
            "urgency": "low",
            "status": "pending",
            "createdAt": "2026-08-01T10:00:00Z"
        }"#;

        let report: HealthReport = serde_json::from_str(raw).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        let round: HealthReport = serde_json::from_value(json).unwrap();
        assert_eq!(round.created_at, report.created_at);
    }

    #[test]
    fn test_new_report_requires_symptoms() {
        let input = NewHealthReport {
            symptoms: "".to_string(),
            description: "since yesterday".to_string(),
            urgency: Urgency::Medium,
            location: None,
        };
        assert!(input.validate().is_err());
    }
}
