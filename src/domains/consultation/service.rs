use crate::auth::AuthContext;
use crate::domains::consultation::repository::ConsultationRepository;
use crate::domains::consultation::types::{Consultation, ConsultationStatus};
use crate::domains::report::repository::ReportRepository;
use crate::errors::{ServiceError, ServiceResult};
use crate::events::{self, EventBus};
use crate::types::{Permission, UserRole};
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Service for consultation threads spawned from appointments
pub struct ConsultationService {
    repo: Arc<dyn ConsultationRepository>,
    report_repo: Arc<dyn ReportRepository>,
    bus: Arc<EventBus>,
}

impl ConsultationService {
    pub fn new(
        repo: Arc<dyn ConsultationRepository>,
        report_repo: Arc<dyn ReportRepository>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repo,
            report_repo,
            bus,
        }
    }

    /// The calling patient's consultations.
    pub async fn consultations_for_patient(
        &self,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<Consultation>> {
        auth.authorize(Permission::ViewConsultations)?;
        self.repo
            .for_patient(&auth.user_id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// The calling doctor's consultations.
    pub async fn consultations_for_doctor(
        &self,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<Consultation>> {
        auth.authorize(Permission::ViewConsultations)?;
        self.repo
            .for_doctor(&auth.user_id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// Villager-side repair: materialize consultations that should exist for
    /// visible reports with an appointed doctor and at least one response but
    /// have no record yet. Returns the number seeded.
    pub async fn seed_from_reports(
        &self,
        auth: &AuthContext,
        patient_name: &str,
    ) -> ServiceResult<usize> {
        auth.authorize(Permission::ViewConsultations)?;

        let visible = self.visible_reports(&auth.user_id).await?;
        let existing = self
            .repo
            .for_patient(&auth.user_id)
            .await
            .map_err(ServiceError::Domain)?;
        let existing_ids: HashSet<&str> = existing.iter().map(|c| c.id.as_str()).collect();

        let mut missing = Vec::new();
        for report in &visible {
            let Some(doctor_id) = report.assigned_doctor_id.as_deref() else {
                continue;
            };
            let Some(response) = report.responses.last() else {
                continue;
            };

            let id = Consultation::deterministic_id(&report.id, doctor_id);
            if existing_ids.contains(id.as_str()) {
                continue;
            }

            let mut consultation = Consultation::from_appointment(report, response, patient_name);
            // The appointment may predate this response; keep the assignment's
            // doctor name when it differs from the responder's.
            if let Some(name) = &report.assigned_doctor_name {
                consultation.doctor_name = name.clone();
            }
            missing.push(consultation);
        }

        if missing.is_empty() {
            return Ok(0);
        }

        let seeded = missing.len();
        let mut next = missing;
        next.extend(existing);
        self.repo
            .replace_for_patient(&auth.user_id, &next)
            .await
            .map_err(ServiceError::Domain)?;

        self.bus.emit(
            events::CONSULTATIONS_UPDATED,
            json!({ "userId": auth.user_id, "reason": "seed_from_reports" }),
        );
        Ok(seeded)
    }

    /// Drop active consultations whose source report is hidden or gone from
    /// the caller's visible set. Returns the number removed.
    pub async fn prune_orphaned(&self, auth: &AuthContext) -> ServiceResult<usize> {
        auth.authorize(Permission::ViewConsultations)?;

        let visible_ids: HashSet<String> = self
            .visible_reports(&auth.user_id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let consultations = self
            .repo
            .for_patient(&auth.user_id)
            .await
            .map_err(ServiceError::Domain)?;
        let before = consultations.len();

        let cleaned: Vec<Consultation> = consultations
            .into_iter()
            .filter(|c| {
                visible_ids.contains(&c.report_id) || c.status != ConsultationStatus::Active
            })
            .collect();

        let removed = before - cleaned.len();
        if removed > 0 {
            self.repo
                .replace_for_patient(&auth.user_id, &cleaned)
                .await
                .map_err(ServiceError::Domain)?;
        }
        Ok(removed)
    }

    /// Move a consultation to a new status in both parties' collections.
    pub async fn set_status(
        &self,
        auth: &AuthContext,
        consultation_id: &str,
        status: ConsultationStatus,
    ) -> ServiceResult<()> {
        auth.authorize(Permission::ViewConsultations)?;

        let own = match auth.role {
            UserRole::Doctor => self.repo.for_doctor(&auth.user_id).await,
            _ => self.repo.for_patient(&auth.user_id).await,
        }
        .map_err(ServiceError::Domain)?;

        let consultation = own
            .iter()
            .find(|c| c.id == consultation_id)
            .ok_or_else(|| {
                ServiceError::Domain(crate::errors::DomainError::EntityNotFound(
                    "Consultation".to_string(),
                    consultation_id.to_string(),
                ))
            })?;

        self.repo
            .modify_by_id(
                &consultation.patient_id,
                &consultation.doctor_id,
                consultation_id,
                &move |c| {
                    c.status = status;
                    c.updated_at = Utc::now();
                },
            )
            .await
            .map_err(ServiceError::Domain)?;

        self.bus.emit(
            events::CONSULTATIONS_UPDATED,
            json!({ "consultationId": consultation_id }),
        );
        Ok(())
    }

    async fn visible_reports(
        &self,
        patient_id: &str,
    ) -> ServiceResult<Vec<crate::domains::report::types::HealthReport>> {
        let reports = self
            .report_repo
            .reports_for_owner(patient_id)
            .await
            .map_err(ServiceError::Domain)?;
        let hidden = self
            .report_repo
            .hidden_ids(UserRole::Villager, patient_id)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(reports
            .into_iter()
            .filter(|r| !hidden.contains(&r.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::consultation::repository::LocalConsultationRepository;
    use crate::domains::report::repository::{LocalReportRepository, ReportRepository};
    use crate::domains::report::types::{DoctorResponse, Urgency};
    use crate::test_support::{sample_consultation, sample_report, test_store};

    async fn setup() -> (
        ConsultationService,
        Arc<LocalReportRepository>,
        Arc<LocalConsultationRepository>,
    ) {
        let store = test_store().await;
        let report_repo = Arc::new(LocalReportRepository::new(store.clone()));
        let repo = Arc::new(LocalConsultationRepository::new(store));
        let service = ConsultationService::new(
            repo.clone(),
            report_repo.clone(),
            Arc::new(EventBus::new()),
        );
        (service, report_repo, repo)
    }

    fn response(doctor_id: &str) -> DoctorResponse {
        DoctorResponse {
            id: format!("response_{}", doctor_id),
            doctor_id: doctor_id.to_string(),
            doctor_name: "Dr. Rao".to_string(),
            advice: "rest and fluids".to_string(),
            prescription: None,
            follow_up_date: None,
            responded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_seed_creates_missing_consultation() {
        let (service, report_repo, repo) = setup().await;

        let mut report = sample_report("r1", "v1", Urgency::High);
        report.assigned_doctor_id = Some("d1".to_string());
        report.assigned_doctor_name = Some("Dr. Rao".to_string());
        report.responses.push(response("d1"));
        report_repo.insert(&report).await.unwrap();

        let auth = AuthContext::new("v1", "Anita", UserRole::Villager);
        let seeded = service.seed_from_reports(&auth, "Anita").await.unwrap();
        assert_eq!(seeded, 1);

        let consultations = repo.for_patient("v1").await.unwrap();
        assert_eq!(consultations.len(), 1);
        assert_eq!(consultations[0].id, "consultation_r1_d1");

        // A second pass finds nothing missing.
        assert_eq!(service.seed_from_reports(&auth, "Anita").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_ignores_hidden_reports() {
        let (service, report_repo, repo) = setup().await;

        let mut report = sample_report("r1", "v1", Urgency::High);
        report.assigned_doctor_id = Some("d1".to_string());
        report.responses.push(response("d1"));
        report_repo.insert(&report).await.unwrap();
        report_repo.hide(UserRole::Villager, "v1", "r1").await.unwrap();

        let auth = AuthContext::new("v1", "Anita", UserRole::Villager);
        assert_eq!(service.seed_from_reports(&auth, "Anita").await.unwrap(), 0);
        assert!(repo.for_patient("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_drops_active_orphans_only() {
        let (service, report_repo, repo) = setup().await;

        // r1 exists and stays visible; r2 does not exist at all.
        report_repo
            .insert(&sample_report("r1", "v1", Urgency::Low))
            .await
            .unwrap();
        repo.upsert_mirrored(&sample_consultation("r1", "d1", "v1"))
            .await
            .unwrap();
        repo.upsert_mirrored(&sample_consultation("r2", "d1", "v1"))
            .await
            .unwrap();
        let mut completed = sample_consultation("r3", "d1", "v1");
        completed.status = ConsultationStatus::Completed;
        repo.upsert_mirrored(&completed).await.unwrap();

        let auth = AuthContext::new("v1", "Anita", UserRole::Villager);
        let removed = service.prune_orphaned(&auth).await.unwrap();
        assert_eq!(removed, 1);

        let remaining = repo.for_patient("v1").await.unwrap();
        let ids: Vec<&str> = remaining.iter().map(|c| c.report_id.as_str()).collect();
        assert!(ids.contains(&"r1"));
        assert!(ids.contains(&"r3"));
        assert!(!ids.contains(&"r2"));
    }

    #[tokio::test]
    async fn test_set_status_updates_both_sides() {
        let (service, _report_repo, repo) = setup().await;
        let consultation = sample_consultation("r1", "d1", "v1");
        repo.upsert_mirrored(&consultation).await.unwrap();

        let auth = AuthContext::new("d1", "Dr. Rao", UserRole::Doctor);
        service
            .set_status(&auth, &consultation.id, ConsultationStatus::Completed)
            .await
            .unwrap();

        assert_eq!(
            repo.for_patient("v1").await.unwrap()[0].status,
            ConsultationStatus::Completed
        );
        assert_eq!(
            repo.for_doctor("d1").await.unwrap()[0].status,
            ConsultationStatus::Completed
        );
    }
}
