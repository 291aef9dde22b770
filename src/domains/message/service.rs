use crate::auth::AuthContext;
use crate::domains::message::repository::MessageRepository;
use crate::domains::message::types::Message;
use crate::domains::notification::service::NotificationService;
use crate::domains::notification::types::NotificationType;
use crate::errors::{ServiceError, ServiceResult, ValidationError};
use crate::types::{Permission, SenderKind, UserRole};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Longest message preview carried in a "New Message" notification.
const PREVIEW_LIMIT: usize = 60;

/// Service for consultation chat threads
pub struct MessageService {
    repo: Arc<dyn MessageRepository>,
    notifications: Arc<NotificationService>,
}

impl MessageService {
    pub fn new(repo: Arc<dyn MessageRepository>, notifications: Arc<NotificationService>) -> Self {
        Self {
            repo,
            notifications,
        }
    }

    /// Chat history for a consultation, oldest first.
    pub async fn messages_for(
        &self,
        auth: &AuthContext,
        consultation_id: &str,
    ) -> ServiceResult<Vec<Message>> {
        auth.authorize(Permission::ViewConsultations)?;
        self.repo
            .for_consultation(consultation_id)
            .await
            .map_err(ServiceError::Domain)
    }

    /// Append a message to a consultation. When the sender is a patient, a
    /// trimmed preview is broadcast to admins and doctors.
    pub async fn send(
        &self,
        auth: &AuthContext,
        consultation_id: &str,
        content: &str,
    ) -> ServiceResult<Message> {
        auth.authorize(Permission::SendMessage)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::Domain(
                ValidationError::required("content").into(),
            ));
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            consultation_id: consultation_id.to_string(),
            sender_id: auth.user_id.clone(),
            sender_name: auth.full_name.clone(),
            role: SenderKind::from_role(auth.role),
            content: content.to_string(),
            timestamp: Utc::now(),
        };

        self.repo.append(&message).await.map_err(ServiceError::Domain)?;

        if message.role != SenderKind::Doctor {
            let preview = message_preview(content);
            let text = format!("{} sent a message: \"{}\"", auth.full_name, preview);
            let data = json!({ "consultationId": consultation_id });

            self.notifications
                .send_role_notification(
                    UserRole::Admin,
                    "New Message",
                    &text,
                    NotificationType::Consultation,
                    data.clone(),
                )
                .await;
            self.notifications
                .send_role_notification(
                    UserRole::Doctor,
                    "New Message",
                    &text,
                    NotificationType::Consultation,
                    data,
                )
                .await;
        }

        Ok(message)
    }
}

fn message_preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_LIMIT {
        let cut: String = content.chars().take(PREVIEW_LIMIT - 3).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::message::repository::LocalMessageRepository;
    use crate::domains::notification::service::LogAlertSink;
    use crate::domains::user::repository::{LocalUserRepository, UserRepository};
    use crate::test_support::{sample_user, test_store};

    async fn setup() -> (MessageService, Arc<NotificationService>) {
        let store = test_store().await;

        // One doctor in the directory so role broadcasts have a target.
        let users = LocalUserRepository::new(store.clone());
        users
            .touch_directory(&sample_user("d1", UserRole::Doctor))
            .await
            .unwrap();

        let notifications = Arc::new(NotificationService::new(
            store.clone(),
            Arc::new(LogAlertSink),
        ));
        let service = MessageService::new(
            Arc::new(LocalMessageRepository::new(store)),
            notifications.clone(),
        );
        (service, notifications)
    }

    #[test]
    fn test_preview_trims_long_content() {
        let long = "x".repeat(80);
        let preview = message_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_LIMIT);
        assert!(preview.ends_with("..."));

        assert_eq!(message_preview("short"), "short");
    }

    #[tokio::test]
    async fn test_send_appends_in_order() {
        let (service, _) = setup().await;
        let doctor = AuthContext::new("d1", "Dr. Rao", UserRole::Doctor);
        let patient = AuthContext::new("v1", "Anita", UserRole::Villager);

        service.send(&doctor, "c1", "how are you feeling?").await.unwrap();
        service.send(&patient, "c1", "much better").await.unwrap();

        let messages = service.messages_for(&doctor, "c1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, SenderKind::Doctor);
        assert_eq!(messages[1].content, "much better");
    }

    #[tokio::test]
    async fn test_patient_message_notifies_doctors() {
        let (service, notifications) = setup().await;
        let patient = AuthContext::new("v1", "Anita", UserRole::Villager);

        service.send(&patient, "c1", "still feverish").await.unwrap();

        let delivered = notifications.notifications_for("d1").await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].title, "New Message");
    }

    #[tokio::test]
    async fn test_doctor_message_does_not_broadcast() {
        let (service, notifications) = setup().await;
        let doctor = AuthContext::new("d1", "Dr. Rao", UserRole::Doctor);

        service.send(&doctor, "c1", "take rest").await.unwrap();

        assert!(notifications.notifications_for("d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let (service, _) = setup().await;
        let patient = AuthContext::new("v1", "Anita", UserRole::Villager);

        assert!(service.send(&patient, "c1", "   ").await.is_err());
    }
}
