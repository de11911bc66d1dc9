// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Messages
//!
//! - [`Message`] — one envelope in an agent's mailbox; its id is its filename.
//! - [`MessageType`] — closed set of message kinds; unknown kinds are rejected
//!   when the envelope is parsed.

use std::fmt;
use std::str::FromStr;

use acp_core::domain::task::TaskPriority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique message identifier, also the mailbox filename stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new random `MessageId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    TaskAssign,
    TaskComplete,
    TaskBlocked,
    ReviewRequest,
    ReviewComplete,
    DependencyMet,
    DependencyNeeded,
    ChangeProposal,
    ChangeApproved,
    ChangeRejected,
    Query,
    Response,
    DecisionRequest,
    DecisionMade,
    Sync,
    Handoff,
    Heartbeat,
}

impl MessageType {
    pub const ALL: [MessageType; 17] = [
        MessageType::TaskAssign,
        MessageType::TaskComplete,
        MessageType::TaskBlocked,
        MessageType::ReviewRequest,
        MessageType::ReviewComplete,
        MessageType::DependencyMet,
        MessageType::DependencyNeeded,
        MessageType::ChangeProposal,
        MessageType::ChangeApproved,
        MessageType::ChangeRejected,
        MessageType::Query,
        MessageType::Response,
        MessageType::DecisionRequest,
        MessageType::DecisionMade,
        MessageType::Sync,
        MessageType::Handoff,
        MessageType::Heartbeat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::TaskAssign => "TASK_ASSIGN",
            MessageType::TaskComplete => "TASK_COMPLETE",
            MessageType::TaskBlocked => "TASK_BLOCKED",
            MessageType::ReviewRequest => "REVIEW_REQUEST",
            MessageType::ReviewComplete => "REVIEW_COMPLETE",
            MessageType::DependencyMet => "DEPENDENCY_MET",
            MessageType::DependencyNeeded => "DEPENDENCY_NEEDED",
            MessageType::ChangeProposal => "CHANGE_PROPOSAL",
            MessageType::ChangeApproved => "CHANGE_APPROVED",
            MessageType::ChangeRejected => "CHANGE_REJECTED",
            MessageType::Query => "QUERY",
            MessageType::Response => "RESPONSE",
            MessageType::DecisionRequest => "DECISION_REQUEST",
            MessageType::DecisionMade => "DECISION_MADE",
            MessageType::Sync => "SYNC",
            MessageType::Handoff => "HANDOFF",
            MessageType::Heartbeat => "HEARTBEAT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    /// Accepts `TASK_ASSIGN` as well as `task-assign` / `task_assign`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        MessageType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown message type '{}'", s))
    }
}

/// Mailbox envelope. Created by a sender into the recipient's inbox, read
/// once by the recipient's worker, then moved into `read/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub requires_ack: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

impl Message {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        message_type: MessageType,
        project: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            timestamp: Utc::now(),
            from: from.into(),
            to: to.into(),
            cc: None,
            message_type,
            project: project.into(),
            task: None,
            priority: TaskPriority::Normal,
            payload: serde_json::Value::Null,
            requires_ack: false,
            deadline: None,
            thread_id: None,
            in_reply_to: None,
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Filename inside a mailbox directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_wire_format() {
        let msg = Message::new("cli-user", "agent-x", MessageType::TaskAssign, "demo")
            .with_task("TASK-0001");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "TASK_ASSIGN");
        assert_eq!(json["requiresAck"], false);
        assert_eq!(json["priority"], "normal");
        assert!(json.get("threadId").is_none());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = r#"{"id":"m1","timestamp":"2026-01-01T00:00:00Z","from":"a","to":"b","type":"PING","project":"p"}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }

    #[test]
    fn test_minimal_envelope_parses_with_defaults() {
        let raw = r#"{"id":"m1","timestamp":"2026-01-01T00:00:00Z","from":"a","to":"b","type":"SYNC","project":"p"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.message_type, MessageType::Sync);
        assert_eq!(msg.payload, serde_json::Value::Null);
        assert_eq!(msg.file_name(), "m1.json");
    }

    #[test]
    fn test_type_from_cli_spelling() {
        assert_eq!("task-assign".parse::<MessageType>().unwrap(), MessageType::TaskAssign);
        assert_eq!("HEARTBEAT".parse::<MessageType>().unwrap(), MessageType::Heartbeat);
        assert!("ping".parse::<MessageType>().is_err());
    }
}
