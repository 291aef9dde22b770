use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a notification, driving presentation urgency downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Emergency,
    NewReport,
    Consultation,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Emergency => "emergency",
            NotificationType::NewReport => "new_report",
            NotificationType::Consultation => "consultation",
            NotificationType::System => "system",
        }
    }
}

/// A notification addressed to one user, or (for the unpersisted fallback
/// broadcast) to a role string acting as a broadcast address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppNotification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape_uses_type_field() {
        let notification = AppNotification {
            id: "n1".to_string(),
            title: "New Health Report".to_string(),
            message: "Anita reported: fever".to_string(),
            kind: NotificationType::NewReport,
            timestamp: Utc::now(),
            read: false,
            user_id: "d1".to_string(),
            data: json!({ "reportId": "r1" }),
        };

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "new_report");
        assert_eq!(json["userId"], "d1");
        assert_eq!(json["data"]["reportId"], "r1");
    }
}
