// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository contracts defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## File Repositories
//!
//! The system of record, one file per aggregate under the coordination root:
//! - **FileSlotRepository** - `slots/<id>.yaml`, revision-checked
//! - **FileAgentRepository** - `agents/<id>.json` plus `agents/<id>/manifest.json`
//! - **FileTaskRepository** - `tasks/<id>.json`
//! - **FileProjectRepository** - `project.json` and directory scaffolding
//!
//! ## In-Memory Repositories
//!
//! HashMap-backed implementations for tests and embedding:
//! - **InMemorySlotRepository**
//! - **InMemoryAgentRepository**
//! - **InMemoryTaskRepository**
//!
//! # Missing data
//!
//! A coordination root without `project.json` is `NotInitialized`. Once it is
//! initialised, a missing collection directory reads as empty. Any other I/O
//! failure surfaces as `RepositoryError::Io`.

pub mod file_agent;
pub mod file_project;
pub mod file_slot;
pub mod file_task;

pub use file_agent::FileAgentRepository;
pub use file_project::FileProjectRepository;
pub use file_slot::FileSlotRepository;
pub use file_task::FileTaskRepository;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::manifest::RoleManifest;
use crate::domain::repository::{
    AgentRepository, RepositoryError, SlotRepository, TaskRepository,
};
use crate::domain::slot::{Slot, SlotId};
use crate::domain::task::{Task, TaskId};
use crate::infrastructure::layout::CoordinationLayout;

pub(crate) async fn ensure_initialized(layout: &CoordinationLayout) -> Result<(), RepositoryError> {
    match fs::metadata(layout.project_file()).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepositoryError::NotInitialized(
            layout.project_root().display().to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>, RepositoryError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Regular, non-hidden files in `dir` with the given extension. A missing
/// directory yields an empty list.
pub(crate) async fn list_record_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, RepositoryError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !entry.file_type().await?.is_file() {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Clone, Default)]
pub struct InMemorySlotRepository {
    slots: Arc<RwLock<HashMap<SlotId, Slot>>>,
}

impl InMemorySlotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotRepository for InMemorySlotRepository {
    async fn save(&self, slot: &mut Slot) -> Result<(), RepositoryError> {
        let mut slots = self.slots.write();
        let stored = slots.get(&slot.id).map(|s| s.revision).unwrap_or(0);
        if stored != slot.revision {
            return Err(RepositoryError::Conflict {
                entity: format!("slot {}", slot.id),
                expected: slot.revision,
                found: stored,
            });
        }
        slot.revision += 1;
        slots.insert(slot.id.clone(), slot.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &SlotId) -> Result<Option<Slot>, RepositoryError> {
        Ok(self.slots.read().get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Slot>, RepositoryError> {
        let mut slots: Vec<Slot> = self.slots.read().values().cloned().collect();
        slots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(slots)
    }

    async fn delete(&self, id: &SlotId) -> Result<(), RepositoryError> {
        self.slots
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("slot {}", id)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
    manifests: Arc<RwLock<HashMap<AgentId, RoleManifest>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.agents.write().insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.read().get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        let mut agents: Vec<Agent> = self.agents.read().values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    async fn delete(&self, id: &AgentId) -> Result<(), RepositoryError> {
        self.agents.write().remove(id);
        Ok(())
    }

    async fn save_manifest(&self, id: &AgentId, manifest: &RoleManifest) -> Result<(), RepositoryError> {
        self.manifests.write().insert(id.clone(), manifest.clone());
        Ok(())
    }

    async fn find_manifest(&self, id: &AgentId) -> Result<Option<RoleManifest>, RepositoryError> {
        Ok(self.manifests.read().get(id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        self.tasks.write().insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tasks.read().get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Task>, RepositoryError> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }
}
