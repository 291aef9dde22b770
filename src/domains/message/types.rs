use crate::types::SenderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat message inside a consultation. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub consultation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub role: SenderKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let message = Message {
            id: "m1".to_string(),
            consultation_id: "consultation_r1_d1".to_string(),
            sender_id: "d1".to_string(),
            sender_name: "Dr. Rao".to_string(),
            role: SenderKind::Doctor,
            content: "rest and fluids".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["consultationId"], "consultation_r1_d1");
        assert_eq!(json["role"], "doctor");
    }
}
