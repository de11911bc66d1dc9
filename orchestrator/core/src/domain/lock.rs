// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Locks
//!
//! Advisory mutual exclusion for read-modify-write cycles on shared records.
//! Independent processes (and machines sharing the project directory) take a
//! lock per resource before loading, and release it after saving.
//!
//! Resource ids are namespaced: `slot-<id>`, `agent-<id>`, `task-<id>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::domain::repository::RepositoryError;
use crate::domain::slot::SlotId;
use crate::domain::task::TaskId;

/// Value object describing who holds a resource lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLock {
    pub resource_id: String,
    /// `<pid>@<hostname>`
    pub held_by: String,
    pub acquired_at: DateTime<Utc>,
    /// Distinguishes this acquisition from a later one on the same resource.
    pub nonce: String,
}

/// Proof of acquisition, handed back on release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub resource_id: String,
    pub nonce: String,
}

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire the lock, retrying per the manager's policy, or fail with
    /// `RepositoryError::LockContention`.
    async fn acquire(&self, resource: &str) -> Result<LockToken, RepositoryError>;

    /// Release a lock. Releasing a lock that was broken and re-taken by
    /// another holder leaves the new holder's lock in place.
    async fn release(&self, token: LockToken) -> Result<(), RepositoryError>;
}

pub fn slot_resource(id: &SlotId) -> String {
    format!("slot-{}", id)
}

pub fn agent_resource(id: &AgentId) -> String {
    format!("agent-{}", id)
}

pub fn task_resource(id: &TaskId) -> String {
    format!("task-{}", id)
}
