// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root: one repository per
//! aggregate, interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `SlotRepository` | `Slot` | `FileSlotRepository`, `InMemorySlotRepository` |
//! | `AgentRepository` | `Agent`, `RoleManifest` | `FileAgentRepository`, `InMemoryAgentRepository` |
//! | `TaskRepository` | `Task` | `FileTaskRepository`, `InMemoryTaskRepository` |
//! | `ProjectRepository` | `Project` | `FileProjectRepository` |
//!
//! Repositories never cache across calls. Callers that read-modify-write a
//! record hold the matching [`crate::domain::lock::LockManager`] lock for the
//! whole cycle.

use async_trait::async_trait;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::manifest::RoleManifest;
use crate::domain::project::Project;
use crate::domain::slot::{Slot, SlotId};
use crate::domain::task::{Task, TaskId};

/// Repository interface for Slot aggregates.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Save a slot (create or update).
    ///
    /// The stored revision must equal `slot.revision` (0 for a new record);
    /// on success `slot.revision` is incremented to the persisted value.
    async fn save(&self, slot: &mut Slot) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &SlotId) -> Result<Option<Slot>, RepositoryError>;

    /// List all slots, ordered by id.
    async fn list_all(&self) -> Result<Vec<Slot>, RepositoryError>;

    async fn delete(&self, id: &SlotId) -> Result<(), RepositoryError>;
}

/// Repository interface for Agent aggregates and their role manifests.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError>;

    /// List all agents, ordered by id.
    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError>;

    async fn delete(&self, id: &AgentId) -> Result<(), RepositoryError>;

    async fn save_manifest(
        &self,
        id: &AgentId,
        manifest: &RoleManifest,
    ) -> Result<(), RepositoryError>;

    async fn find_manifest(&self, id: &AgentId) -> Result<Option<RoleManifest>, RepositoryError>;
}

/// Repository interface for Task aggregates.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError>;

    /// List all tasks, ordered by creation time.
    async fn list_all(&self) -> Result<Vec<Task>, RepositoryError>;
}

/// Repository interface for the project descriptor.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Load the descriptor; `NotInitialized` when the project was never set up.
    async fn load(&self) -> Result<Project, RepositoryError>;

    async fn is_initialized(&self) -> Result<bool, RepositoryError>;

    async fn save(&self, project: &Project) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    #[error("No coordination project found at {0}. Run 'acp init' first.")]
    NotInitialized(String),

    #[error("Storage unavailable: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Concurrent modification of {entity}: expected revision {expected}, found {found}")]
    Conflict {
        entity: String,
        expected: u64,
        found: u64,
    },

    #[error("Resource {resource} is locked by {holder}")]
    LockContention { resource: String, holder: String },
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RepositoryError {
    fn from(err: serde_yaml::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Io(err.to_string())
    }
}
