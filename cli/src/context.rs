// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-invocation wiring of stores and services.
//!
//! Every CLI process builds its own context from the project root and the
//! discovered configuration. Nothing is shared in memory between processes;
//! coordination happens through the files and lock files under the
//! coordination root.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use acp_core::application::presence::AgentPresence;
use acp_core::application::role_manifest::RoleManifestBuilder;
use acp_core::application::slot_claim::StandardSlotClaimService;
use acp_core::application::task::TaskService;
use acp_core::domain::coordination_config::CoordinationConfig;
use acp_core::domain::repository::ProjectRepository;
use acp_core::domain::task::Task;
use acp_core::infrastructure::layout::CoordinationLayout;
use acp_core::infrastructure::lock::FileLockManager;
use acp_core::infrastructure::repositories::{
    FileAgentRepository, FileProjectRepository, FileSlotRepository, FileTaskRepository,
};
use acp_swarm::domain::message::{Message, MessageType};
use acp_swarm::infrastructure::mailbox::{FileMailbox, Mailbox};

pub struct CoordinationContext {
    pub config: CoordinationConfig,
    pub layout: CoordinationLayout,
    pub slots: Arc<FileSlotRepository>,
    pub agents: Arc<FileAgentRepository>,
    pub tasks: Arc<FileTaskRepository>,
    pub projects: Arc<FileProjectRepository>,
    pub locks: Arc<FileLockManager>,
    pub mailbox: Arc<FileMailbox>,
}

impl CoordinationContext {
    /// Resolve the project root (default: current directory), load and
    /// validate configuration, and wire the file-backed stores.
    pub fn load(project: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let project_root = match project {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };

        let config = CoordinationConfig::load_or_default(config_path, &project_root)
            .context("Failed to load configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(Self::from_config(project_root, config))
    }

    pub fn from_config(project_root: impl Into<PathBuf>, config: CoordinationConfig) -> Self {
        let layout = CoordinationLayout::from_config(project_root, &config);
        let locks = FileLockManager::new(layout.locks_dir(), config.spec.locks.clone());

        Self {
            slots: Arc::new(FileSlotRepository::new(layout.clone())),
            agents: Arc::new(FileAgentRepository::new(layout.clone())),
            tasks: Arc::new(FileTaskRepository::new(layout.clone())),
            projects: Arc::new(FileProjectRepository::new(layout.clone())),
            locks: Arc::new(locks),
            mailbox: Arc::new(FileMailbox::new()),
            config,
            layout,
        }
    }

    /// Clear temp files left behind by interrupted writers.
    pub async fn recover(&self) {
        let removed =
            self.slots.recover().await + self.agents.recover().await + self.tasks.recover().await;
        if removed > 0 {
            debug!(removed, "Removed interrupted temp files");
        }
    }

    pub fn claim_service(&self) -> StandardSlotClaimService {
        StandardSlotClaimService::new(
            self.slots.clone(),
            self.agents.clone(),
            self.projects.clone(),
            self.locks.clone(),
            RoleManifestBuilder::new(
                self.layout.clone(),
                self.config.spec.constraints.clone(),
                self.config.spec.role.clone(),
            ),
        )
    }

    pub fn task_service(&self) -> TaskService {
        TaskService::new(self.tasks.clone(), self.projects.clone(), self.locks.clone())
    }

    pub fn presence(&self) -> AgentPresence {
        AgentPresence::new(self.agents.clone(), self.locks.clone())
    }

    /// Inbox directory of `agent`, rooted at the project's configured inbox path.
    pub async fn inbox_for(&self, agent: &str) -> Result<PathBuf> {
        let project = self.projects.load().await?;
        Ok(project.config.inbox_path.join(agent))
    }

    /// Enqueue `message` into the inbox of its recipient.
    pub async fn send(&self, message: &Message) -> Result<PathBuf> {
        let inbox = self.inbox_for(&message.to).await?;
        let path = self
            .mailbox
            .enqueue(&inbox, message)
            .await
            .with_context(|| format!("Failed to deliver message to {}", message.to))?;
        Ok(path)
    }

    /// Tell the task's assignee about it with a TASK_ASSIGN message.
    pub async fn notify_assignment(&self, task: &Task, from: &str) -> Result<Option<PathBuf>> {
        let Some(assignee) = task.assignee.as_deref() else {
            return Ok(None);
        };
        let project = self.projects.load().await?;
        let message = Message::new(from, assignee, MessageType::TaskAssign, project.id)
            .with_task(task.id.to_string())
            .with_priority(task.priority)
            .with_payload(serde_json::json!({
                "title": task.title,
                "description": task.description,
            }));
        self.send(&message).await.map(Some)
    }
}
