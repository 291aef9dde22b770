use crate::auth::AuthContext;
use crate::domains::consultation::repository::ConsultationRepository;
use crate::domains::consultation::types::{Consultation, ConsultationResponse, ConsultationStatus, LastMessage};
use crate::domains::message::repository::MessageRepository;
use crate::domains::message::types::Message;
use crate::domains::notification::service::NotificationService;
use crate::domains::notification::types::NotificationType;
use crate::domains::report::repository::ReportRepository;
use crate::domains::report::types::{
    DoctorResponse, HealthReport, NewHealthReport, ReportStatus, ReportWithSubmitter, ResponseInput,
    SystemStats, Urgency,
};
use crate::domains::user::repository::UserRepository;
use crate::errors::{DomainError, ServiceError, ServiceResult};
use crate::events::{self, EventBus};
use crate::types::{Permission, SenderKind, UserRole};
use crate::validation::Validate;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Service for the report lifecycle: submission, doctor responses,
/// appointment, and the two soft-delete flows.
///
/// Every mutation updates the global collection and the owner mirror
/// together, then signals the bus and fans out notifications, in that order.
/// None of it is transactional across keys.
pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
    consultations: Arc<dyn ConsultationRepository>,
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<NotificationService>,
    bus: Arc<EventBus>,
}

impl ReportService {
    pub fn new(
        repo: Arc<dyn ReportRepository>,
        consultations: Arc<dyn ConsultationRepository>,
        messages: Arc<dyn MessageRepository>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<NotificationService>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repo,
            consultations,
            messages,
            users,
            notifications,
            bus,
        }
    }

    /// Villager: submit a new health report.
    pub async fn submit_report(
        &self,
        auth: &AuthContext,
        input: NewHealthReport,
    ) -> ServiceResult<HealthReport> {
        auth.authorize(Permission::SubmitReport)?;
        input.validate().map_err(ServiceError::Domain)?;

        let report = HealthReport {
            id: Uuid::new_v4().to_string(),
            user_id: auth.user_id.clone(),
            symptoms: input.symptoms,
            description: input.description,
            urgency: input.urgency,
            status: ReportStatus::Pending,
            location: input.location,
            created_at: Utc::now(),
            responses: Vec::new(),
            assigned_doctor_id: None,
            assigned_doctor_name: None,
        };

        self.repo.insert(&report).await.map_err(ServiceError::Domain)?;
        self.bus.emit(
            events::ALL_REPORTS_UPDATED,
            json!({ "reason": "new_report", "reportId": report.id }),
        );

        // Submitting implies an active session; make sure the directory
        // reflects it so admin views count this villager.
        match self.users.current_session().await {
            Ok(Some(user)) if user.id == auth.user_id => {
                self.users
                    .touch_directory(&user)
                    .await
                    .map_err(ServiceError::Domain)?;
                self.bus.emit(events::USERS_UPDATED, json!({ "userId": user.id }));
            }
            Ok(_) => {}
            Err(e) => log::warn!("Failed to sync directory on report submit: {}", e),
        }

        let kind = if matches!(report.urgency, Urgency::Emergency) {
            NotificationType::Emergency
        } else {
            NotificationType::NewReport
        };
        let message = format!(
            "{} has submitted a {} priority health report.",
            auth.full_name,
            report.urgency.as_str()
        );
        let data = json!({
            "reportId": report.id,
            "patientId": auth.user_id,
            "urgency": report.urgency,
        });

        self.notifications
            .send_role_notification(UserRole::Admin, "New Health Report", &message, kind, data.clone())
            .await;
        self.notifications
            .send_role_notification(UserRole::Doctor, "New Health Report", &message, kind, data)
            .await;

        Ok(report)
    }

    /// Doctor: respond to a report. Rejected when another doctor is already
    /// appointed to it.
    pub async fn respond(
        &self,
        auth: &AuthContext,
        report_id: &str,
        input: ResponseInput,
    ) -> ServiceResult<DoctorResponse> {
        auth.authorize(Permission::RespondToReport)?;
        input.validate().map_err(ServiceError::Domain)?;

        let report = self
            .repo
            .find_global(report_id)
            .await
            .map_err(ServiceError::Domain)?
            .ok_or_else(|| not_found("HealthReport", report_id))?;

        if let Some(assigned) = report.assigned_doctor_id.as_deref() {
            if assigned != auth.user_id {
                return Err(ServiceError::PermissionDenied(
                    "Another doctor is already appointed to this report".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let response = DoctorResponse {
            id: format!("response_{}_{}_{}", report_id, auth.user_id, Uuid::new_v4()),
            doctor_id: auth.user_id.clone(),
            doctor_name: auth.full_name.clone(),
            advice: input.advice,
            prescription: input.prescription.filter(|p| !p.is_empty()),
            follow_up_date: input
                .follow_up_days
                .filter(|days| *days > 0)
                .map(|days| now + Duration::days(days)),
            responded_at: now,
        };

        let appended = response.clone();
        self.repo
            .modify_in_mirrors(&report.user_id, report_id, &move |r| {
                r.status = ReportStatus::Reviewed;
                r.responses.push(appended.clone());
            })
            .await
            .map_err(ServiceError::Domain)?;

        self.bus.emit(
            events::ALL_REPORTS_UPDATED,
            json!({ "reason": "doctor_response", "reportId": report_id }),
        );

        // Mirror the response into any existing consultations for this report
        // on both sides.
        let advice = response.advice.clone();
        let consultation_patch = ConsultationResponse {
            doctor_id: response.doctor_id.clone(),
            doctor_name: response.doctor_name.clone(),
            advice: response.advice.clone(),
            prescription: response.prescription.clone(),
            responded_at: response.responded_at,
        };
        self.consultations
            .modify_for_report(&report.user_id, &auth.user_id, report_id, &move |c| {
                c.status = ConsultationStatus::Active;
                c.updated_at = now;
                c.last_message = Some(LastMessage {
                    content: advice.clone(),
                    timestamp: now,
                    sender: SenderKind::Doctor,
                });
                c.responses.push(consultation_patch.clone());
            })
            .await
            .map_err(ServiceError::Domain)?;

        self.bus.emit(
            events::CONSULTATIONS_UPDATED,
            json!({
                "userId": report.user_id,
                "doctorId": auth.user_id,
                "reportId": report_id,
            }),
        );

        // Notify only the villager and admins, not other doctors.
        self.notifications
            .send_user_notification(
                &report.user_id,
                "Doctor Response",
                &format!("Dr. {} responded to your health report.", auth.full_name),
                NotificationType::Consultation,
                json!({
                    "reportId": report_id,
                    "doctorId": auth.user_id,
                    "doctorName": auth.full_name,
                    "advicePreview": response.advice,
                    "responseId": response.id,
                }),
            )
            .await;
        self.notifications
            .send_role_notification(
                UserRole::Admin,
                "Doctor Responded",
                &format!(
                    "Dr. {} responded to {}'s report.",
                    auth.full_name,
                    self.submitter_name(&report.user_id).await
                ),
                NotificationType::Consultation,
                json!({
                    "reportId": report_id,
                    "patientId": report.user_id,
                    "doctorId": auth.user_id,
                }),
            )
            .await;

        // The patient was just notified directly; advance their monitoring
        // watermark so the next scan does not notify this response again.
        if let Err(e) = self.notifications.touch_patient_watermark(&report.user_id).await {
            log::warn!("Failed to advance patient watermark: {}", e);
        }

        Ok(response)
    }

    /// Villager: appoint one doctor among the responses on their own report.
    /// Returns the materialized consultation, or None when the report is no
    /// longer visible to its owner.
    pub async fn appoint_doctor(
        &self,
        auth: &AuthContext,
        report_id: &str,
        doctor_id: &str,
    ) -> ServiceResult<Option<Consultation>> {
        auth.authorize(Permission::AppointDoctor)?;

        let report = self
            .repo
            .find_global(report_id)
            .await
            .map_err(ServiceError::Domain)?
            .ok_or_else(|| not_found("HealthReport", report_id))?;

        if report.user_id != auth.user_id {
            return Err(ServiceError::PermissionDenied(
                "Only the report owner can appoint a doctor".to_string(),
            ));
        }

        let response = report
            .response_from(doctor_id)
            .cloned()
            .ok_or_else(|| not_found("DoctorResponse", doctor_id))?;

        let assigned_id = response.doctor_id.clone();
        let assigned_name = response.doctor_name.clone();
        self.repo
            .modify_in_mirrors(&report.user_id, report_id, &move |r| {
                r.status = ReportStatus::Reviewed;
                r.assigned_doctor_id = Some(assigned_id.clone());
                r.assigned_doctor_name = Some(assigned_name.clone());
            })
            .await
            .map_err(ServiceError::Domain)?;

        self.bus.emit(
            events::ALL_REPORTS_UPDATED,
            json!({
                "reason": "appoint_doctor",
                "reportId": report_id,
                "doctorId": doctor_id,
            }),
        );

        // Materialize the consultation only while the source report is still
        // visible to its owner. The deterministic id makes re-appointment a
        // dedupe rather than a duplicate.
        let consultation = if self.is_visible_to_owner(&report.user_id, report_id).await? {
            let consultation = Consultation::from_appointment(&report, &response, &auth.full_name);
            self.consultations
                .upsert_mirrored(&consultation)
                .await
                .map_err(ServiceError::Domain)?;

            let seed = Message {
                id: Uuid::new_v4().to_string(),
                consultation_id: consultation.id.clone(),
                sender_id: response.doctor_id.clone(),
                sender_name: response.doctor_name.clone(),
                role: SenderKind::Doctor,
                content: response.advice.clone(),
                timestamp: response.responded_at,
            };
            self.messages
                .replace_thread(&consultation.id, &[seed])
                .await
                .map_err(ServiceError::Domain)?;

            Some(consultation)
        } else {
            None
        };

        self.bus.emit(
            events::CONSULTATIONS_UPDATED,
            json!({
                "userId": report.user_id,
                "reportId": report_id,
                "doctorId": doctor_id,
            }),
        );

        let data = json!({
            "reportId": report_id,
            "patientId": report.user_id,
            "doctorId": doctor_id,
        });
        self.notifications
            .send_user_notification(
                doctor_id,
                "Appointment Assigned",
                &format!(
                    "{} appointed you to their case (Report #{}).",
                    auth.full_name, report_id
                ),
                NotificationType::System,
                data.clone(),
            )
            .await;
        let broadcast_message = format!(
            "{} appointed Dr. {} to Report #{}.",
            auth.full_name, response.doctor_name, report_id
        );
        self.notifications
            .send_role_notification(
                UserRole::Admin,
                "Appointment Assigned",
                &broadcast_message,
                NotificationType::System,
                data.clone(),
            )
            .await;
        self.notifications
            .send_role_notification(
                UserRole::Doctor,
                "Appointment Assigned",
                &broadcast_message,
                NotificationType::System,
                data,
            )
            .await;

        Ok(consultation)
    }

    /// Doctor: walk away from an appointment. Clears the assignment fields
    /// (only when assigned to the caller) and hides the report from the
    /// caller's own view; the report itself stays.
    pub async fn delete_appointment(&self, auth: &AuthContext, report_id: &str) -> ServiceResult<()> {
        auth.authorize(Permission::DeleteAppointment)?;

        let report = self
            .repo
            .find_global(report_id)
            .await
            .map_err(ServiceError::Domain)?
            .ok_or_else(|| not_found("HealthReport", report_id))?;

        let doctor_id = auth.user_id.clone();
        self.repo
            .modify_in_mirrors(&report.user_id, report_id, &move |r| {
                if r.assigned_doctor_id.as_deref() == Some(doctor_id.as_str()) {
                    r.assigned_doctor_id = None;
                    r.assigned_doctor_name = None;
                }
            })
            .await
            .map_err(ServiceError::Domain)?;

        self.repo
            .hide(UserRole::Doctor, &auth.user_id, report_id)
            .await
            .map_err(ServiceError::Domain)?;

        // Only the patient and admins hear about this.
        self.notifications
            .send_user_notification(
                &report.user_id,
                "Appointment Deleted",
                &format!(
                    "Dr. {} removed their appointment for your report.",
                    auth.full_name
                ),
                NotificationType::System,
                json!({
                    "reportId": report_id,
                    "doctorId": auth.user_id,
                    "doctorName": auth.full_name,
                }),
            )
            .await;
        self.notifications
            .send_role_notification(
                UserRole::Admin,
                "Appointment Deleted",
                &format!(
                    "Dr. {} removed their appointment for {}'s report.",
                    auth.full_name,
                    self.submitter_name(&report.user_id).await
                ),
                NotificationType::System,
                json!({
                    "reportId": report_id,
                    "patientId": report.user_id,
                    "doctorId": auth.user_id,
                }),
            )
            .await;

        Ok(())
    }

    /// Villager: hide a report from their own view and cascade away its
    /// consultations and chat threads. The report stays in the global
    /// collection and remains visible to admins and other doctors.
    pub async fn soft_delete_report(&self, auth: &AuthContext, report_id: &str) -> ServiceResult<()> {
        auth.authorize(Permission::DeleteOwnReport)?;

        self.repo
            .hide(UserRole::Villager, &auth.user_id, report_id)
            .await
            .map_err(ServiceError::Domain)?;

        let removed = self
            .consultations
            .remove_for_report_from_patient(&auth.user_id, report_id)
            .await
            .map_err(ServiceError::Domain)?;

        for consultation in &removed {
            if let Err(e) = self.messages.remove_thread(&consultation.id).await {
                log::warn!("Failed to drop chat thread {}: {}", consultation.id, e);
            }
            if let Err(e) = self
                .consultations
                .remove_by_id_from_doctor(&consultation.doctor_id, &consultation.id)
                .await
            {
                log::warn!(
                    "Failed to remove consultation {} from doctor {}: {}",
                    consultation.id,
                    consultation.doctor_id,
                    e
                );
            }
        }

        self.bus.emit(
            events::CONSULTATIONS_UPDATED,
            json!({ "userId": auth.user_id, "reportId": report_id }),
        );
        Ok(())
    }

    /// Villager: own reports, minus anything soft-deleted.
    pub async fn reports_for_owner(&self, auth: &AuthContext) -> ServiceResult<Vec<HealthReport>> {
        auth.authorize(Permission::ViewOwnReports)?;

        let reports = self
            .repo
            .reports_for_owner(&auth.user_id)
            .await
            .map_err(ServiceError::Domain)?;
        let hidden = self
            .repo
            .hidden_ids(UserRole::Villager, &auth.user_id)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(reports
            .into_iter()
            .filter(|r| !hidden.contains(&r.id))
            .collect())
    }

    /// Doctor: the global collection minus the caller's hidden set, enriched
    /// with submitter details and sorted by urgency then recency.
    pub async fn reports_for_doctor(
        &self,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<ReportWithSubmitter>> {
        auth.authorize(Permission::ViewAllReports)?;

        let reports = self.repo.all_reports().await.map_err(ServiceError::Domain)?;
        let hidden = self
            .repo
            .hidden_ids(UserRole::Doctor, &auth.user_id)
            .await
            .map_err(ServiceError::Domain)?;

        let visible: Vec<HealthReport> = reports
            .into_iter()
            .filter(|r| !hidden.contains(&r.id))
            .collect();
        self.enrich_and_sort(visible).await
    }

    /// Admin: the whole global collection, enriched and sorted.
    pub async fn all_reports(&self, auth: &AuthContext) -> ServiceResult<Vec<ReportWithSubmitter>> {
        auth.authorize_admin()?;

        let reports = self.repo.all_reports().await.map_err(ServiceError::Domain)?;
        self.enrich_and_sort(reports).await
    }

    /// Admin: system-wide counters for the dashboard.
    pub async fn system_stats(&self, auth: &AuthContext) -> ServiceResult<SystemStats> {
        auth.authorize(Permission::ViewSystemStats)?;

        let reports = self.repo.all_reports().await.map_err(ServiceError::Domain)?;
        let directory = self.users.list_directory().await.map_err(ServiceError::Domain)?;

        let mut stats = SystemStats {
            total_reports: reports.len(),
            total_users: directory.len(),
            ..Default::default()
        };

        for report in &reports {
            match report.status {
                ReportStatus::Pending => stats.pending_reports += 1,
                ReportStatus::Reviewed => stats.reviewed_reports += 1,
                ReportStatus::Resolved => stats.resolved_reports += 1,
                ReportStatus::Active => {}
            }
            if matches!(report.urgency, Urgency::Emergency) {
                stats.emergency_reports += 1;
            }
        }

        for entry in &directory {
            if entry.is_active {
                stats.active_users += 1;
            }
            match entry.role {
                UserRole::Villager => stats.villagers += 1,
                UserRole::Doctor => stats.doctors += 1,
                UserRole::Admin => {}
            }
        }

        Ok(stats)
    }

    async fn is_visible_to_owner(&self, owner_id: &str, report_id: &str) -> ServiceResult<bool> {
        let reports = self
            .repo
            .reports_for_owner(owner_id)
            .await
            .map_err(ServiceError::Domain)?;
        let hidden = self
            .repo
            .hidden_ids(UserRole::Villager, owner_id)
            .await
            .map_err(ServiceError::Domain)?;

        Ok(reports
            .iter()
            .any(|r| r.id == report_id && !hidden.contains(&r.id)))
    }

    async fn enrich_and_sort(
        &self,
        reports: Vec<HealthReport>,
    ) -> ServiceResult<Vec<ReportWithSubmitter>> {
        let directory = self.users.list_directory().await.map_err(ServiceError::Domain)?;
        let by_id: HashMap<&str, &crate::domains::user::types::DirectoryEntry> =
            directory.iter().map(|e| (e.id.as_str(), e)).collect();

        let mut enriched: Vec<ReportWithSubmitter> = reports
            .into_iter()
            .map(|report| {
                let entry = by_id.get(report.user_id.as_str());
                ReportWithSubmitter {
                    user_name: entry
                        .map(|e| e.full_name.clone())
                        .unwrap_or_else(|| "Unknown User".to_string()),
                    user_phone: entry.map(|e| e.phone_number.clone()),
                    user_village: entry.and_then(|e| e.village.clone()),
                    report,
                }
            })
            .collect();

        enriched.sort_by(|a, b| {
            b.report
                .urgency
                .rank()
                .cmp(&a.report.urgency.rank())
                .then(b.report.created_at.cmp(&a.report.created_at))
        });
        Ok(enriched)
    }

    async fn submitter_name(&self, user_id: &str) -> String {
        match self.users.list_directory().await {
            Ok(directory) => directory
                .iter()
                .find(|e| e.id == user_id)
                .map(|e| e.full_name.clone())
                .unwrap_or_else(|| "a villager".to_string()),
            Err(_) => "a villager".to_string(),
        }
    }
}

fn not_found(entity: &str, id: &str) -> ServiceError {
    ServiceError::Domain(DomainError::EntityNotFound(entity.to_string(), id.to_string()))
}
