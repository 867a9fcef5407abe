//! Message domain type for the file-backed inter-agent bus.
//!
//! `MessageType` is a closed enum but `payload` stays an arbitrary JSON
//! object, since escalation and status-update messages carry shapes
//! that vary by message kind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of message types that can cross the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskAssignment,
    TaskComplete,
    ReviewRequest,
    ReviewResult,
    MergeRequest,
    MergeResult,
    BuildResult,
    TestResult,
    DesignDecision,
    Escalation,
    StatusUpdate,
}

/// A message between two agents, persisted as a single JSON file under
/// the recipient's inbox directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub sender: String,
    pub recipient: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default = "new_msg_id")]
    pub id: String,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub read: bool,
}

fn new_msg_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

impl Message {
    pub fn new(
        msg_type: MessageType,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            msg_type,
            sender: sender.into(),
            recipient: recipient.into(),
            payload,
            id: new_msg_id(),
            timestamp: chrono::Utc::now(),
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_is_unread() {
        let msg = Message::new(
            MessageType::TaskComplete,
            "dev-01",
            "reviewer-01",
            serde_json::json!({"task_id": "boot-001"}),
        );
        assert!(!msg.read);
        assert_eq!(msg.sender, "dev-01");
        assert_eq!(msg.recipient, "reviewer-01");
    }

    #[test]
    fn ids_are_unique() {
        let a = Message::new(MessageType::StatusUpdate, "x", "y", serde_json::Value::Null);
        let b = Message::new(MessageType::StatusUpdate, "x", "y", serde_json::Value::Null);
        assert_ne!(a.id, b.id);
    }
}
