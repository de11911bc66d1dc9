// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Presence
//!
//! Liveness mutations on agent records. Each update is a locked
//! read-modify-write so a heartbeat never overwrites a concurrent release.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::agent::{Agent, AgentId};
use crate::domain::lock::{agent_resource, LockManager};
use crate::domain::repository::{AgentRepository, RepositoryError};

#[derive(Clone)]
pub struct AgentPresence {
    agents: Arc<dyn AgentRepository>,
    locks: Arc<dyn LockManager>,
}

impl AgentPresence {
    pub fn new(agents: Arc<dyn AgentRepository>, locks: Arc<dyn LockManager>) -> Self {
        Self { agents, locks }
    }

    /// Set `lastActive` to now. A missing agent record is `NotFound`.
    pub async fn heartbeat(&self, id: &AgentId) -> Result<Agent, RepositoryError> {
        self.update(id, |agent| agent.heartbeat(Utc::now())).await
    }

    pub async fn mark_offline(&self, id: &AgentId) -> Result<Agent, RepositoryError> {
        self.update(id, Agent::mark_offline).await
    }

    async fn update<F>(&self, id: &AgentId, mutate: F) -> Result<Agent, RepositoryError>
    where
        F: FnOnce(&mut Agent) + Send,
    {
        let token = self.locks.acquire(&agent_resource(id)).await?;

        let result = async {
            let mut agent = self
                .agents
                .find_by_id(id)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(format!("agent {}", id)))?;
            mutate(&mut agent);
            self.agents.save(&agent).await?;
            Ok(agent)
        }
        .await;

        if let Err(e) = self.locks.release(token).await {
            warn!(agent_id = %id, error = %e, "Failed to release agent lock");
        }
        if result.is_ok() {
            debug!(agent_id = %id, "Agent record updated");
        }
        result
    }
}
