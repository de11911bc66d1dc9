// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::slot::SlotId;

/// Agent identity; equal to the name requested at claim time or the slot id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// LLM provider an agent runs on. Closed set; unknown values are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentProvider {
    Openclaw,
    Claude,
    Codex,
    Openai,
    Custom,
}

impl AgentProvider {
    pub const ALL: [AgentProvider; 5] = [
        AgentProvider::Openclaw,
        AgentProvider::Claude,
        AgentProvider::Codex,
        AgentProvider::Openai,
        AgentProvider::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentProvider::Openclaw => "openclaw",
            AgentProvider::Claude => "claude",
            AgentProvider::Codex => "codex",
            AgentProvider::Openai => "openai",
            AgentProvider::Custom => "custom",
        }
    }
}

impl fmt::Display for AgentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        AgentProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown provider '{}' (expected one of: openclaw, claude, codex, openai, custom)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Active,
    Busy,
    Blocked,
    Offline,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Active => "active",
            AgentStatus::Busy => "busy",
            AgentStatus::Blocked => "blocked",
            AgentStatus::Offline => "offline",
            AgentStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub tasks_completed: u32,
    pub tasks_assigned: u32,
    pub avg_response_time: String,
    pub uptime: String,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            tasks_assigned: 0,
            avg_response_time: "0s".to_string(),
            uptime: "0%".to_string(),
        }
    }
}

/// Worker identity bound to a slot and a provider/model pair.
///
/// Created by the claim service; afterwards only heartbeats mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub slot_id: SlotId,
    pub role: String,
    pub provider: AgentProvider,
    pub model: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub metrics: AgentMetrics,
}

impl Agent {
    pub fn new(
        id: AgentId,
        slot_id: SlotId,
        role: impl Into<String>,
        provider: AgentProvider,
        model: impl Into<String>,
        session_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: id.0.clone(),
            id,
            slot_id,
            role: role.into(),
            provider,
            model: model.into(),
            status: AgentStatus::Idle,
            current_task: None,
            session_key: Some(session_key.into()),
            capabilities: Vec::new(),
            joined_at: now,
            last_active: now,
            metrics: AgentMetrics::default(),
        }
    }

    /// Record liveness.
    pub fn heartbeat(&mut self, at: DateTime<Utc>) {
        self.last_active = at;
    }

    pub fn mark_offline(&mut self) {
        self.status = AgentStatus::Offline;
        self.current_task = None;
    }

    /// Whether the agent has shown life within `window` of `now`.
    pub fn is_live(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.status != AgentStatus::Offline && now - self.last_active <= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!("OpenClaw".parse::<AgentProvider>().unwrap(), AgentProvider::Openclaw);
        assert!("gemini".parse::<AgentProvider>().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected_on_deserialize() {
        assert!(serde_json::from_str::<AgentProvider>("\"gemini\"").is_err());
        assert_eq!(
            serde_json::from_str::<AgentProvider>("\"codex\"").unwrap(),
            AgentProvider::Codex
        );
    }

    #[test]
    fn test_agent_json_uses_camel_case() {
        let now = Utc::now();
        let agent = Agent::new(
            AgentId::new("agent-x"),
            SlotId::new("s1"),
            "backend-developer",
            AgentProvider::Openclaw,
            "m1",
            "main-s1-abc",
            now,
        );
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["slotId"], "s1");
        assert_eq!(json["status"], "idle");
        assert_eq!(json["metrics"]["avgResponseTime"], "0s");
        assert!(json.get("currentTask").is_none());
    }

    #[test]
    fn test_liveness_window() {
        let now = Utc::now();
        let mut agent = Agent::new(
            AgentId::new("a"),
            SlotId::new("s"),
            "dev",
            AgentProvider::Claude,
            "m",
            "k",
            now - chrono::Duration::minutes(10),
        );
        assert!(!agent.is_live(now, chrono::Duration::minutes(1)));
        agent.heartbeat(now);
        assert!(agent.is_live(now, chrono::Duration::minutes(1)));
        agent.mark_offline();
        assert!(!agent.is_live(now, chrono::Duration::minutes(1)));
    }
}
