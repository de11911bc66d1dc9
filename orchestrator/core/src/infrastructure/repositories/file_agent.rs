// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! JSON agent store: `agents/<id>.json` and `agents/<id>/manifest.json`.

use async_trait::async_trait;
use tracing::warn;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::manifest::RoleManifest;
use crate::domain::repository::{AgentRepository, RepositoryError};
use crate::infrastructure::atomic::{recover_interrupted_writes, write_atomic, INTERRUPTED_WRITE_GRACE};
use crate::infrastructure::layout::CoordinationLayout;
use crate::infrastructure::repositories::{ensure_initialized, list_record_files, read_optional};

pub struct FileAgentRepository {
    layout: CoordinationLayout,
}

impl FileAgentRepository {
    pub fn new(layout: CoordinationLayout) -> Self {
        Self { layout }
    }

    pub async fn recover(&self) -> usize {
        recover_interrupted_writes(&self.layout.agents_dir(), INTERRUPTED_WRITE_GRACE).await
    }
}

#[async_trait]
impl AgentRepository for FileAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        ensure_initialized(&self.layout).await?;
        let json = serde_json::to_vec_pretty(agent)?;
        write_atomic(&self.layout.agent_file(&agent.id), &json).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        ensure_initialized(&self.layout).await?;
        match read_optional(&self.layout.agent_file(id)).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        ensure_initialized(&self.layout).await?;
        let mut agents = Vec::new();
        for path in list_record_files(&self.layout.agents_dir(), "json").await? {
            let Some(content) = read_optional(&path).await? else {
                continue;
            };
            match serde_json::from_str::<Agent>(&content) {
                Ok(agent) => agents.push(agent),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable agent file"),
            }
        }
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    async fn delete(&self, id: &AgentId) -> Result<(), RepositoryError> {
        ensure_initialized(&self.layout).await?;
        match tokio::fs::remove_file(self.layout.agent_file(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_manifest(&self, id: &AgentId, manifest: &RoleManifest) -> Result<(), RepositoryError> {
        ensure_initialized(&self.layout).await?;
        let json = serde_json::to_vec_pretty(manifest)?;
        write_atomic(&self.layout.manifest_file(id), &json).await?;
        Ok(())
    }

    async fn find_manifest(&self, id: &AgentId) -> Result<Option<RoleManifest>, RepositoryError> {
        ensure_initialized(&self.layout).await?;
        match read_optional(&self.layout.manifest_file(id)).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentProvider;
    use crate::domain::slot::SlotId;
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_ignores_manifest_directories() {
        let dir = TempDir::new().unwrap();
        let layout = CoordinationLayout::with_defaults(dir.path());
        layout.scaffold().await.unwrap();
        std::fs::write(layout.project_file(), "{}").unwrap();
        let repo = FileAgentRepository::new(layout.clone());

        let agent = Agent::new(
            AgentId::new("agent-b"),
            SlotId::new("s1"),
            "dev",
            AgentProvider::Codex,
            "m1",
            "main-s1-x",
            Utc::now(),
        );
        repo.save(&agent).await.unwrap();
        std::fs::create_dir_all(layout.agent_dir(&agent.id)).unwrap();
        std::fs::write(layout.context_file(&agent.id), "# notes").unwrap();

        let agents = repo.list_all().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0], agent);
        assert!(repo.find_manifest(&agent.id).await.unwrap().is_none());

        repo.delete(&agent.id).await.unwrap();
        assert!(repo.find_by_id(&agent.id).await.unwrap().is_none());
    }
}
