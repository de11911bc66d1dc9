// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordination Layout
//!
//! Path arithmetic for the coordination root. Nothing here touches the disk
//! except [`CoordinationLayout::scaffold`].
//!
//! ```text
//! <project>/<coordinationDir>/
//!   project.json
//!   config.yaml
//!   slots/<slotId>.yaml
//!   agents/<agentId>.json
//!   agents/<agentId>/manifest.json
//!   tasks/<taskId>.json
//!   messages/inbox/<agentId>/
//!   messages/outbox/
//!   messages/broadcast/
//!   state/
//!   locks/
//! ```

use std::path::{Path, PathBuf};

use crate::domain::agent::AgentId;
use crate::domain::coordination_config::{CoordinationConfig, DEFAULT_COORDINATION_DIR};
use crate::domain::slot::SlotId;
use crate::domain::task::TaskId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationLayout {
    project_root: PathBuf,
    root: PathBuf,
}

impl CoordinationLayout {
    pub fn new(project_root: impl Into<PathBuf>, coordination_dir: &str) -> Self {
        let project_root = project_root.into();
        let root = project_root.join(coordination_dir);
        Self { project_root, root }
    }

    pub fn from_config(project_root: impl Into<PathBuf>, config: &CoordinationConfig) -> Self {
        Self::new(project_root, &config.spec.coordination_dir)
    }

    /// Layout with the default `.acp` directory name.
    pub fn with_defaults(project_root: impl Into<PathBuf>) -> Self {
        Self::new(project_root, DEFAULT_COORDINATION_DIR)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_file(&self) -> PathBuf {
        self.root.join("project.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn slots_dir(&self) -> PathBuf {
        self.root.join("slots")
    }

    pub fn slot_file(&self, id: &SlotId) -> PathBuf {
        self.slots_dir().join(format!("{}.yaml", id))
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn agent_file(&self, id: &AgentId) -> PathBuf {
        self.agents_dir().join(format!("{}.json", id))
    }

    /// Per-agent directory holding the manifest and context notes.
    pub fn agent_dir(&self, id: &AgentId) -> PathBuf {
        self.agents_dir().join(id.as_str())
    }

    pub fn manifest_file(&self, id: &AgentId) -> PathBuf {
        self.agent_dir(id).join("manifest.json")
    }

    pub fn context_file(&self, id: &AgentId) -> PathBuf {
        self.agent_dir(id).join("context.md")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn task_file(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{}.json", id))
    }

    pub fn messages_dir(&self) -> PathBuf {
        self.root.join("messages")
    }

    pub fn inbox_root(&self) -> PathBuf {
        self.messages_dir().join("inbox")
    }

    pub fn inbox(&self, agent: &AgentId) -> PathBuf {
        self.inbox_root().join(agent.as_str())
    }

    pub fn outbox(&self) -> PathBuf {
        self.messages_dir().join("outbox")
    }

    pub fn broadcast(&self) -> PathBuf {
        self.messages_dir().join("broadcast")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn lock_file(&self, resource: &str) -> PathBuf {
        self.locks_dir().join(format!("{}.lock", resource))
    }

    /// Every directory `acp init` creates.
    pub fn scaffold_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.root.clone(),
            self.slots_dir(),
            self.agents_dir(),
            self.tasks_dir(),
            self.inbox_root(),
            self.outbox(),
            self.broadcast(),
            self.state_dir(),
            self.locks_dir(),
        ]
    }

    pub async fn scaffold(&self) -> std::io::Result<()> {
        for dir in self.scaffold_dirs() {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_rooted_under_coordination_dir() {
        let layout = CoordinationLayout::with_defaults("/work/demo");
        assert_eq!(layout.root(), Path::new("/work/demo/.acp"));
        assert_eq!(
            layout.slot_file(&SlotId::new("backend-1")),
            PathBuf::from("/work/demo/.acp/slots/backend-1.yaml")
        );
        assert_eq!(
            layout.manifest_file(&AgentId::new("agent-x")),
            PathBuf::from("/work/demo/.acp/agents/agent-x/manifest.json")
        );
        assert_eq!(
            layout.inbox(&AgentId::new("agent-x")),
            PathBuf::from("/work/demo/.acp/messages/inbox/agent-x")
        );
        assert_eq!(
            layout.lock_file("slot-backend-1"),
            PathBuf::from("/work/demo/.acp/locks/slot-backend-1.lock")
        );
    }

    #[test]
    fn test_custom_coordination_dir() {
        let layout = CoordinationLayout::new("/p", ".coord");
        assert_eq!(layout.project_file(), PathBuf::from("/p/.coord/project.json"));
        assert!(layout.scaffold_dirs().iter().all(|d| d.starts_with("/p/.coord")));
    }
}
