// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Project descriptor store and coordination-root scaffolding.

use async_trait::async_trait;
use tracing::info;

use crate::domain::agent::AgentProvider;
use crate::domain::project::{Project, ProjectConfig, ProjectStatus};
use crate::domain::repository::{ProjectRepository, RepositoryError, SlotRepository};
use crate::domain::slot::{Slot, SlotId};
use crate::infrastructure::atomic::write_atomic;
use crate::infrastructure::layout::CoordinationLayout;
use crate::infrastructure::repositories::{read_optional, FileSlotRepository};

pub const EXAMPLE_SLOT_ID: &str = "example-agent";

pub struct FileProjectRepository {
    layout: CoordinationLayout,
}

impl FileProjectRepository {
    pub fn new(layout: CoordinationLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CoordinationLayout {
        &self.layout
    }

    /// Descriptor for a fresh project named after its directory.
    pub fn default_project(&self) -> Project {
        let root = self.layout.project_root();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Project {
            id: name.clone(),
            name,
            description: String::new(),
            path: root.to_path_buf(),
            status: ProjectStatus::Active,
            current_sprint: None,
            agents: Vec::new(),
            config: ProjectConfig {
                inbox_path: self.layout.inbox_root(),
                outbox_path: self.layout.outbox(),
                repository: String::new(),
                default_branch: "main".to_string(),
                coordinator_url: None,
                auto_assign: false,
                require_approval: true,
            },
        }
    }

    /// Create the directory tree, `project.json` and an unapproved example slot.
    pub async fn initialize(&self) -> Result<Project, RepositoryError> {
        if self.is_initialized().await? {
            return Err(RepositoryError::AlreadyExists(
                self.layout.project_file().display().to_string(),
            ));
        }

        self.layout.scaffold().await?;
        let project = self.default_project();
        self.save(&project).await?;

        let mut example = example_slot();
        FileSlotRepository::new(self.layout.clone())
            .save(&mut example)
            .await?;

        info!(root = %self.layout.root().display(), "Coordination root initialized");
        Ok(project)
    }
}

pub fn example_slot() -> Slot {
    let mut slot = Slot::new(
        SlotId::new(EXAMPLE_SLOT_ID),
        "backend-developer",
        vec![AgentProvider::Openclaw],
        vec!["kimi-coding/k2p5".to_string()],
        1,
    );
    slot.name = "Example Agent".to_string();
    slot
}

#[async_trait]
impl ProjectRepository for FileProjectRepository {
    async fn load(&self) -> Result<Project, RepositoryError> {
        match read_optional(&self.layout.project_file()).await? {
            Some(content) => Ok(serde_json::from_str(&content)?),
            None => Err(RepositoryError::NotInitialized(
                self.layout.project_root().display().to_string(),
            )),
        }
    }

    async fn is_initialized(&self) -> Result<bool, RepositoryError> {
        match tokio::fs::metadata(self.layout.project_file()).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, project: &Project) -> Result<(), RepositoryError> {
        let json = serde_json::to_vec_pretty(project)?;
        write_atomic(&self.layout.project_file(), &json).await?;
        Ok(())
    }
}
