use crate::domains::notification::types::{AppNotification, NotificationType};
use crate::domains::report::types::{HealthReport, Urgency};
use crate::domains::user::types::{DirectoryEntry, RegisteredUser};
use crate::errors::DomainResult;
use crate::store::{keys, RecordStore};
use crate::types::UserRole;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// Interval of the background monitoring scan.
const MONITOR_PERIOD: Duration = Duration::from_secs(10);
const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Side-effecting delivery hook (desktop banner, sound). Non-authoritative:
/// a sink failure must never affect persisted notification state.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, notification: &AppNotification);
}

/// Default sink that only logs deliveries.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn deliver(&self, notification: &AppNotification) {
        log::debug!(
            "notification [{}] for {}: {}",
            notification.kind.as_str(),
            notification.user_id,
            notification.title
        );
    }
}

/// Singleton fan-out mechanism for notifications.
///
/// Persists one record per recipient into `notifications_<userId>` and emits
/// to in-process subscribers, who filter on their own user id or role. The
/// monitoring task re-scans the report collections every 10 seconds and
/// notifies on anything newer than the per-user watermark.
pub struct NotificationService {
    store: Arc<RecordStore>,
    sender: broadcast::Sender<AppNotification>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    alert_sink: Arc<dyn AlertSink>,
}

impl NotificationService {
    pub fn new(store: Arc<RecordStore>, alert_sink: Arc<dyn AlertSink>) -> Self {
        let (sender, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            store,
            sender,
            monitor: Mutex::new(None),
            alert_sink,
        }
    }

    /// Subscribe to live notifications. The receiver sees every emission;
    /// callers filter on `user_id` matching their own id or role string.
    pub fn subscribe(&self) -> broadcast::Receiver<AppNotification> {
        self.sender.subscribe()
    }

    /// Stream adapter over [`subscribe`](Self::subscribe).
    pub fn subscribe_stream(&self) -> BroadcastStream<AppNotification> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Send a notification to a specific user and persist it to their
    /// notification list. Best-effort: a persistence failure is logged and
    /// the live emission still happens.
    pub async fn send_user_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationType,
        data: Value,
    ) {
        let notification = self.build(user_id, title, message, kind, data);

        let key = keys::notifications(user_id);
        match self.store.read_list::<AppNotification>(&key).await {
            Ok(mut existing) => {
                existing.insert(0, notification.clone());
                if let Err(e) = self.store.write_list(&key, &existing).await {
                    log::error!("Failed to persist user notification: {}", e);
                }
            }
            Err(e) => log::error!("Failed to persist user notification: {}", e),
        }

        self.emit(notification);
    }

    /// Send a notification to all users with the given role.
    ///
    /// Targets are resolved by unioning the admin directory and the
    /// registered-accounts collection, de-duplicated by id-or-email. With
    /// zero matches a single role-addressed notification goes out to live
    /// subscribers only and is not persisted anywhere; a user who is
    /// offline and absent from both collections never receives it.
    pub async fn send_role_notification(
        &self,
        role: UserRole,
        title: &str,
        message: &str,
        kind: NotificationType,
        data: Value,
    ) {
        let targets = match self.resolve_role_targets(role).await {
            Ok(targets) => targets,
            Err(e) => {
                log::error!("Failed to send role notifications: {}", e);
                return;
            }
        };

        if targets.is_empty() {
            let notification = self.build(role.as_str(), title, message, kind, data);
            self.emit(notification);
            return;
        }

        for target_id in targets {
            self.send_user_notification(&target_id, title, message, kind, data.clone())
                .await;
        }
    }

    /// Persisted notifications for one user, newest first.
    pub async fn notifications_for(&self, user_id: &str) -> DomainResult<Vec<AppNotification>> {
        self.store.read_list(&keys::notifications(user_id)).await
    }

    pub async fn unread_count(&self, user_id: &str) -> DomainResult<usize> {
        let notifications = self.notifications_for(user_id).await?;
        Ok(notifications.iter().filter(|n| !n.read).count())
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> DomainResult<()> {
        self.rewrite(user_id, |notifications| {
            for n in notifications.iter_mut() {
                if n.id == notification_id {
                    n.read = true;
                }
            }
        })
        .await
    }

    pub async fn mark_all_read(&self, user_id: &str) -> DomainResult<()> {
        self.rewrite(user_id, |notifications| {
            for n in notifications.iter_mut() {
                n.read = true;
            }
        })
        .await
    }

    pub async fn remove(&self, user_id: &str, notification_id: &str) -> DomainResult<()> {
        self.rewrite(user_id, |notifications| {
            notifications.retain(|n| n.id != notification_id);
        })
        .await
    }

    /// Explicit clear is the only way persisted notifications go away.
    pub async fn clear(&self, user_id: &str) -> DomainResult<()> {
        self.store
            .write_list::<AppNotification>(&keys::notifications(user_id), &[])
            .await
    }

    /// Install the repeating monitoring scan for this user. A no-op if a
    /// monitor is already running.
    pub fn start_monitoring(self: Arc<Self>, role: UserRole, user_id: Option<String>) {
        let mut guard = match self.monitor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_some() {
            return;
        }

        let service = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MONITOR_PERIOD);
            // Skip the interval's immediate first tick; scans start one full
            // period after installation.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let result = match role {
                    UserRole::Doctor => service.check_for_new_reports(user_id.as_deref()).await,
                    UserRole::Villager => match user_id.as_deref() {
                        Some(patient_id) => service.check_for_report_updates(patient_id).await,
                        None => Ok(0),
                    },
                    UserRole::Admin => Ok(0),
                };

                if let Err(e) = result {
                    log::warn!("Notification monitoring scan failed: {}", e);
                }
            }
        });

        *guard = Some(handle);
    }

    /// Tear down the monitoring scan, if any.
    pub fn stop_monitoring(&self) {
        let mut guard = match self.monitor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }

    /// One doctor-side scan: reports created after the watermark with no
    /// responses yet, assigned to `doctor_id` (or, with no doctor id, the
    /// legacy role-broadcast fallback). Advances the watermark afterwards.
    /// Returns the number of reports notified.
    pub async fn check_for_new_reports(&self, doctor_id: Option<&str>) -> DomainResult<usize> {
        let reports: Vec<HealthReport> = self.store.read_list(keys::ALL_REPORTS).await?;

        let check_key = match doctor_id {
            Some(id) => keys::last_doctor_check(id),
            None => keys::LAST_NOTIFICATION_CHECK.to_string(),
        };
        let last_check = self.read_watermark(&check_key).await?;

        let new_reports: Vec<&HealthReport> = reports
            .iter()
            .filter(|report| {
                let assigned_to_doctor = match doctor_id {
                    Some(id) => report.assigned_doctor_id.as_deref() == Some(id),
                    None => true,
                };
                report.created_at > last_check && !report.has_responses() && assigned_to_doctor
            })
            .collect();

        let mut notified = 0;
        for report in new_reports {
            let (title, kind) = if matches!(report.urgency, Urgency::Emergency) {
                ("Emergency Health Report!", NotificationType::Emergency)
            } else {
                ("New Health Report", NotificationType::NewReport)
            };

            let submitter = self.submitter_name(&report.user_id).await;
            let message = format!("{} reported: {}", submitter, symptom_preview(&report.symptoms));
            let data = serde_json::json!({
                "reportId": report.id,
                "patientId": report.user_id,
                "urgency": report.urgency,
            });

            match doctor_id {
                Some(id) => {
                    self.send_user_notification(id, title, &message, kind, data)
                        .await;
                }
                None => {
                    self.send_role_notification(UserRole::Doctor, title, &message, kind, data)
                        .await;
                }
            }
            notified += 1;
        }

        self.store.write_value(&check_key, &Utc::now()).await?;
        Ok(notified)
    }

    /// One patient-side scan: responses on the patient's reports newer than
    /// the watermark each produce a "Doctor Response" notification. Advances
    /// the watermark afterwards. Returns the number of responses notified.
    pub async fn check_for_report_updates(&self, patient_id: &str) -> DomainResult<usize> {
        let reports: Vec<HealthReport> = self.store.read_list(keys::ALL_REPORTS).await?;

        let check_key = keys::last_patient_check(patient_id);
        let last_check = self.read_watermark(&check_key).await?;

        let mut notified = 0;
        for report in reports.iter().filter(|r| r.user_id == patient_id) {
            for response in &report.responses {
                if response.responded_at <= last_check {
                    continue;
                }

                self.send_user_notification(
                    patient_id,
                    "Doctor Response",
                    &format!("Dr. {}: {}", response.doctor_name, response.advice),
                    NotificationType::Consultation,
                    serde_json::json!({
                        "reportId": report.id,
                        "doctorName": response.doctor_name,
                        "advicePreview": response.advice,
                        "responseId": response.id,
                    }),
                )
                .await;
                notified += 1;
            }
        }

        self.store.write_value(&check_key, &Utc::now()).await?;
        Ok(notified)
    }

    /// Advance a patient's monitoring watermark to now. Write sites that have
    /// already notified the patient directly call this so the next scan does
    /// not notify the same response again.
    pub async fn touch_patient_watermark(&self, patient_id: &str) -> DomainResult<()> {
        self.store
            .write_value(&keys::last_patient_check(patient_id), &Utc::now())
            .await
    }

    fn build(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationType,
        data: Value,
    ) -> AppNotification {
        AppNotification {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            message: message.to_string(),
            kind,
            timestamp: Utc::now(),
            read: false,
            user_id: user_id.to_string(),
            data,
        }
    }

    fn emit(&self, notification: AppNotification) {
        self.alert_sink.deliver(&notification);
        // Delivery is best-effort: with no live subscribers the event is dropped.
        let _ = self.sender.send(notification);
    }

    async fn rewrite(
        &self,
        user_id: &str,
        apply: impl FnOnce(&mut Vec<AppNotification>),
    ) -> DomainResult<()> {
        let key = keys::notifications(user_id);
        let mut notifications: Vec<AppNotification> = self.store.read_list(&key).await?;
        apply(&mut notifications);
        self.store.write_list(&key, &notifications).await
    }

    async fn read_watermark(&self, key: &str) -> DomainResult<DateTime<Utc>> {
        Ok(self
            .store
            .read_value::<DateTime<Utc>>(key)
            .await?
            .unwrap_or(DateTime::UNIX_EPOCH))
    }

    async fn resolve_role_targets(&self, role: UserRole) -> DomainResult<Vec<String>> {
        let directory: Vec<DirectoryEntry> = self.store.read_list(keys::USERS).await?;
        let registered: Vec<RegisteredUser> =
            self.store.read_list(keys::REGISTERED_USERS).await?;

        // Combine both sources so every user of the role is reached, not only
        // currently active ones.
        let mut seen: HashSet<String> = HashSet::new();
        let mut targets = Vec::new();

        let candidates = directory
            .iter()
            .map(|e| (e.id.clone(), e.email.clone(), e.role))
            .chain(
                registered
                    .iter()
                    .map(|r| (r.user.id.clone(), r.user.email.clone(), r.user.role)),
            );

        for (id, email, candidate_role) in candidates {
            let dedup_key = if !id.is_empty() { id.clone() } else { email.clone() };
            if dedup_key.is_empty() || !seen.insert(dedup_key) {
                continue;
            }
            if candidate_role == role {
                targets.push(if !id.is_empty() { id } else { email });
            }
        }

        Ok(targets)
    }

    async fn submitter_name(&self, user_id: &str) -> String {
        let directory: Vec<DirectoryEntry> = self
            .store
            .read_list(keys::USERS)
            .await
            .unwrap_or_default();

        directory
            .iter()
            .find(|e| e.id == user_id)
            .map(|e| e.full_name.clone())
            .unwrap_or_else(|| "A villager".to_string())
    }
}

/// First two comma-separated symptoms, with an ellipsis when more follow.
fn symptom_preview(symptoms: &str) -> String {
    let parts: Vec<&str> = symptoms
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if parts.len() > 2 {
        format!("{}...", parts[..2].join(", "))
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::user::repository::{LocalUserRepository, UserRepository};
    use crate::test_support::{sample_report, sample_user, test_store};
    use crate::domains::report::types::Urgency;
    use serde_json::json;

    fn service(store: Arc<RecordStore>) -> Arc<NotificationService> {
        Arc::new(NotificationService::new(store, Arc::new(LogAlertSink)))
    }

    #[test]
    fn test_symptom_preview_trims_to_two() {
        assert_eq!(symptom_preview("fever"), "fever");
        assert_eq!(symptom_preview("fever, cough"), "fever, cough");
        assert_eq!(symptom_preview("fever, cough, headache"), "fever, cough...");
    }

    #[tokio::test]
    async fn test_user_notification_persists_and_emits() {
        let store = test_store().await;
        let service = service(store.clone());
        let mut rx = service.subscribe();

        service
            .send_user_notification(
                "v1",
                "Doctor Response",
                "Dr. Rao: rest and fluids",
                NotificationType::Consultation,
                json!({ "reportId": "r1" }),
            )
            .await;

        let live = rx.recv().await.unwrap();
        assert_eq!(live.user_id, "v1");
        assert!(!live.read);

        let persisted = service.notifications_for("v1").await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].title, "Doctor Response");
    }

    #[tokio::test]
    async fn test_role_fan_out_dedupes_across_collections() {
        let store = test_store().await;
        let repo = LocalUserRepository::new(store.clone());

        // Two doctors; d1 appears in both the directory and the registered
        // collection and must still get exactly one notification.
        let d1 = sample_user("d1", UserRole::Doctor);
        let d2 = sample_user("d2", UserRole::Doctor);
        repo.touch_directory(&d1).await.unwrap();
        repo.touch_directory(&d2).await.unwrap();
        repo.create_registered(crate::domains::user::types::RegisteredUser {
            user: d1.clone(),
            password_hash: "hash".to_string(),
        })
        .await
        .unwrap();

        let service = service(store);
        service
            .send_role_notification(
                UserRole::Doctor,
                "New Health Report",
                "Anita reported: fever",
                NotificationType::NewReport,
                json!({}),
            )
            .await;

        assert_eq!(service.notifications_for("d1").await.unwrap().len(), 1);
        assert_eq!(service.notifications_for("d2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_fan_out_skips_other_roles() {
        let store = test_store().await;
        let repo = LocalUserRepository::new(store.clone());
        repo.touch_directory(&sample_user("v1", UserRole::Villager))
            .await
            .unwrap();

        let service = service(store);
        service
            .send_role_notification(
                UserRole::Doctor,
                "New Health Report",
                "m",
                NotificationType::NewReport,
                json!({}),
            )
            .await;

        assert!(service.notifications_for("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_fallback_emits_without_persisting() {
        let store = test_store().await;
        let service = service(store);
        let mut rx = service.subscribe();

        service
            .send_role_notification(
                UserRole::Doctor,
                "New Health Report",
                "m",
                NotificationType::NewReport,
                json!({}),
            )
            .await;

        let live = rx.recv().await.unwrap();
        assert_eq!(live.user_id, "doctor");
        assert!(service.notifications_for("doctor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_doctor_scan_notifies_assigned_unanswered_reports() {
        let store = test_store().await;
        let service = service(store.clone());

        let mut assigned = sample_report("r1", "v1", Urgency::High);
        assigned.assigned_doctor_id = Some("d1".to_string());
        let unassigned = sample_report("r2", "v1", Urgency::Low);
        store
            .write_list(keys::ALL_REPORTS, &[assigned, unassigned])
            .await
            .unwrap();

        let notified = service.check_for_new_reports(Some("d1")).await.unwrap();
        assert_eq!(notified, 1);
        assert_eq!(service.notifications_for("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_doctor_scan_watermark_prevents_renotification() {
        let store = test_store().await;
        let service = service(store.clone());

        let mut report = sample_report("r1", "v1", Urgency::Emergency);
        report.assigned_doctor_id = Some("d1".to_string());
        store.write_list(keys::ALL_REPORTS, &[report]).await.unwrap();

        assert_eq!(service.check_for_new_reports(Some("d1")).await.unwrap(), 1);
        assert_eq!(service.check_for_new_reports(Some("d1")).await.unwrap(), 0);
        assert_eq!(service.notifications_for("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_patient_scan_watermark_advances_when_idle() {
        let store = test_store().await;
        let service = service(store.clone());
        store
            .write_list(keys::ALL_REPORTS, &[sample_report("r1", "v1", Urgency::Low)])
            .await
            .unwrap();

        let before = Utc::now();
        assert_eq!(service.check_for_report_updates("v1").await.unwrap(), 0);

        let watermark: DateTime<Utc> = store
            .read_value(&keys::last_patient_check("v1"))
            .await
            .unwrap()
            .unwrap();
        assert!(watermark >= before);
    }

    #[tokio::test]
    async fn test_doctor_scan_emergency_title_for_emergency_reports() {
        let store = test_store().await;
        let service = service(store.clone());

        let mut report = sample_report("r1", "v1", Urgency::Emergency);
        report.assigned_doctor_id = Some("d1".to_string());
        store.write_list(keys::ALL_REPORTS, &[report]).await.unwrap();

        service.check_for_new_reports(Some("d1")).await.unwrap();

        let notifications = service.notifications_for("d1").await.unwrap();
        assert_eq!(notifications[0].title, "Emergency Health Report!");
        assert_eq!(notifications[0].kind, NotificationType::Emergency);
    }

    #[tokio::test]
    async fn test_mark_read_and_clear() {
        let store = test_store().await;
        let service = service(store);

        service
            .send_user_notification("v1", "t", "m", NotificationType::System, json!({}))
            .await;
        let id = service.notifications_for("v1").await.unwrap()[0].id.clone();

        service.mark_read("v1", &id).await.unwrap();
        assert_eq!(service.unread_count("v1").await.unwrap(), 0);

        service.clear("v1").await.unwrap();
        assert!(service.notifications_for("v1").await.unwrap().is_empty());
    }
}
