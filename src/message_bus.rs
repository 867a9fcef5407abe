//! File-backed inter-agent message bus.
//!
//! Per-recipient inboxes are plain directories under the metadata
//! subtree; each message is one JSON file named by its id.

use std::path::PathBuf;

use tracing::debug;

use crate::domain::{Message, MessageType};
use crate::error::PersistenceError;

/// File-backed message bus rooted at `<meta>/messages/`.
#[derive(Debug, Clone)]
pub struct MessageBus {
    base_path: PathBuf,
}

impl MessageBus {
    pub fn new(meta_root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let base_path = meta_root.into().join("messages");
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn inbox(&self, agent_id: &str) -> PathBuf {
        self.base_path.join(agent_id)
    }

    fn message_path(&self, agent_id: &str, msg_id: &str) -> PathBuf {
        self.inbox(agent_id).join(format!("{msg_id}.json"))
    }

    /// Write `message` to its recipient's inbox, creating the inbox
    /// directory if this is the first message to that recipient.
    pub fn send(&self, message: &Message) -> Result<(), PersistenceError> {
        let inbox = self.inbox(&message.recipient);
        std::fs::create_dir_all(&inbox)?;
        let path = self.message_path(&message.recipient, &message.id);
        let body = serde_json::to_string_pretty(message).map_err(|source| PersistenceError::Parse {
            kind: "message",
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(&path, body)?;
        debug!(msg_id = %message.id, recipient = %message.recipient, ?message.msg_type, "message sent");
        Ok(())
    }

    /// Every message in `agent_id`'s inbox, sorted by filename (stable,
    /// not strictly chronological since ids are random). Filters out
    /// already-read messages unless `unread_only` is false.
    pub fn receive(&self, agent_id: &str, unread_only: bool) -> Result<Vec<Message>, PersistenceError> {
        let inbox = self.inbox(agent_id);
        if !inbox.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&inbox)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut messages = Vec::new();
        for path in paths {
            let msg = Self::load_message(&path)?;
            if unread_only && msg.read {
                continue;
            }
            messages.push(msg);
        }
        Ok(messages)
    }

    /// Set the read flag on a persisted message. A mark on a missing
    /// message is a no-op.
    pub fn mark_read(&self, agent_id: &str, msg_id: &str) -> Result<(), PersistenceError> {
        let path = self.message_path(agent_id, msg_id);
        if !path.exists() {
            return Ok(());
        }
        let mut msg = Self::load_message(&path)?;
        msg.read = true;
        let body = serde_json::to_string_pretty(&msg).map_err(|source| PersistenceError::Parse {
            kind: "message",
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(&path, body)?;
        Ok(())
    }

    /// Send a copy of `payload` to every existing inbox other than the
    /// sender's.
    pub fn broadcast(&self, from_agent: &str, msg_type: MessageType, payload: serde_json::Value) -> Result<(), PersistenceError> {
        if !self.base_path.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let recipient = entry.file_name().to_string_lossy().to_string();
            if recipient == from_agent {
                continue;
            }
            let msg = Message::new(msg_type, from_agent, recipient, payload.clone());
            self.send(&msg)?;
        }
        Ok(())
    }

    /// Every message exchanged between `a` and `b`, across both inboxes,
    /// sorted by timestamp.
    pub fn get_conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, PersistenceError> {
        let mut messages = Vec::new();
        for agent_id in [a, b] {
            let inbox = self.inbox(agent_id);
            if !inbox.exists() {
                continue;
            }
            for entry in std::fs::read_dir(&inbox)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let msg = Self::load_message(&path)?;
                if msg.sender == a || msg.sender == b {
                    messages.push(msg);
                }
            }
        }
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    fn load_message(path: &std::path::Path) -> Result<Message, PersistenceError> {
        let body = std::fs::read_to_string(path)?;
        serde_json::from_str(&body).map_err(|source| PersistenceError::Parse {
            kind: "message",
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn send_then_receive_round_trips() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();

        let msg = Message::new(MessageType::TaskAssignment, "scheduler", "dev-01", serde_json::json!({"task_id": "a"}));
        bus.send(&msg).unwrap();

        let inbox = bus.receive("dev-01", true).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, msg.id);
    }

    #[test]
    fn mark_read_filters_from_unread_receive() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();

        let msg = Message::new(MessageType::StatusUpdate, "a", "b", serde_json::Value::Null);
        bus.send(&msg).unwrap();
        bus.mark_read("b", &msg.id).unwrap();

        assert!(bus.receive("b", true).unwrap().is_empty());
        assert_eq!(bus.receive("b", false).unwrap().len(), 1);
    }

    #[test]
    fn mark_read_on_missing_message_is_noop() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();
        assert!(bus.mark_read("nobody", "missing").is_ok());
    }

    #[test]
    fn broadcast_skips_sender() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();

        let seed_a = Message::new(MessageType::StatusUpdate, "x", "dev-01", serde_json::Value::Null);
        let seed_b = Message::new(MessageType::StatusUpdate, "x", "dev-02", serde_json::Value::Null);
        bus.send(&seed_a).unwrap();
        bus.send(&seed_b).unwrap();

        bus.broadcast("dev-01", MessageType::Escalation, serde_json::json!({"reason": "stuck"})).unwrap();

        assert_eq!(bus.receive("dev-02", true).unwrap().len(), 2);
        assert_eq!(bus.receive("dev-01", true).unwrap().len(), 1);
    }

    #[test]
    fn conversation_spans_both_inboxes_sorted_by_time() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();

        let mut first = Message::new(MessageType::ReviewRequest, "dev-01", "reviewer-01", serde_json::Value::Null);
        first.timestamp = chrono::Utc::now() - chrono::Duration::seconds(10);
        let second = Message::new(MessageType::ReviewResult, "reviewer-01", "dev-01", serde_json::Value::Null);

        bus.send(&first).unwrap();
        bus.send(&second).unwrap();

        let convo = bus.get_conversation("dev-01", "reviewer-01").unwrap();
        assert_eq!(convo.len(), 2);
        assert_eq!(convo[0].id, first.id);
        assert_eq!(convo[1].id, second.id);
    }
}
