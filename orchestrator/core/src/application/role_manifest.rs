// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Role Manifest Builder
//!
//! Synthesises the immutable [`RoleManifest`] issued to an agent at claim
//! time from the slot, the project descriptor and the configured defaults.

use crate::domain::agent::AgentId;
use crate::domain::coordination_config::{ConstraintDefaults, RoleDefaults};
use crate::domain::manifest::{
    role_title, ManifestAgent, ManifestCommunication, ManifestConstraints, ManifestContext,
    ManifestRole, ManifestTeam, Permission, RoleManifest, MANIFEST_VERSION,
};
use crate::domain::project::Project;
use crate::domain::slot::Slot;
use crate::infrastructure::layout::CoordinationLayout;

/// Permissions granted to every agent that claims a slot.
pub const CLAIMANT_PERMISSIONS: [Permission; 2] = [Permission::SubmitCode, Permission::Escalate];

#[derive(Debug, Clone)]
pub struct RoleManifestBuilder {
    layout: CoordinationLayout,
    constraints: ConstraintDefaults,
    role: RoleDefaults,
}

impl RoleManifestBuilder {
    pub fn new(layout: CoordinationLayout, constraints: ConstraintDefaults, role: RoleDefaults) -> Self {
        Self {
            layout,
            constraints,
            role,
        }
    }

    /// `teammates` are the ids of slots currently claimed, this one included.
    pub fn build(
        &self,
        agent_id: &AgentId,
        slot: &Slot,
        session_key: &str,
        project: &Project,
        teammates: Vec<String>,
    ) -> RoleManifest {
        RoleManifest {
            manifest_version: MANIFEST_VERSION.to_string(),
            agent: ManifestAgent {
                id: agent_id.to_string(),
                slot_id: slot.id.to_string(),
                session_key: session_key.to_string(),
            },
            role: ManifestRole {
                id: slot.role.clone(),
                title: role_title(&slot.role),
                responsibilities: self.role.responsibilities.clone(),
                permissions: CLAIMANT_PERMISSIONS.to_vec(),
                escalation_path: self.role.escalation_path.clone(),
            },
            team: ManifestTeam {
                project: project.id.clone(),
                sprint: project.sprint_id().to_string(),
                reports_to: self.role.reports_to.clone(),
                teammates,
            },
            communication: ManifestCommunication {
                inbox: project.config.inbox_path.join(agent_id.as_str()),
                outbox: project.config.outbox_path.clone(),
                broadcast: self.layout.broadcast(),
            },
            context: ManifestContext {
                load_files: vec![
                    self.layout.project_root().join("README.md"),
                    self.layout.context_file(agent_id),
                ],
            },
            constraints: ManifestConstraints {
                max_task_duration: self.constraints.max_task_duration.clone(),
                requires_review: self.constraints.requires_review,
                can_deploy_to: self.constraints.can_deploy_to.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentProvider;
    use crate::domain::slot::SlotId;
    use crate::infrastructure::repositories::FileProjectRepository;
    use std::path::PathBuf;

    #[test]
    fn test_manifest_uses_project_paths_and_defaults() {
        let layout = CoordinationLayout::with_defaults("/work/demo");
        let project = FileProjectRepository::new(layout.clone()).default_project();
        let slot = Slot::new(
            SlotId::new("backend-1"),
            "backend-developer",
            vec![AgentProvider::Openclaw],
            vec!["m1".to_string()],
            1,
        );
        let builder = RoleManifestBuilder::new(layout, ConstraintDefaults::default(), RoleDefaults::default());

        let manifest = builder.build(
            &AgentId::new("agent-x"),
            &slot,
            "main-backend-1-abc",
            &project,
            vec!["backend-1".to_string()],
        );

        assert_eq!(manifest.manifest_version, "1.0");
        assert_eq!(manifest.role.title, "Backend Developer");
        assert!(manifest.has_permission(Permission::SubmitCode));
        assert!(manifest.has_permission(Permission::Escalate));
        assert!(!manifest.has_permission(Permission::DeployToProd));
        assert_eq!(manifest.team.project, "demo");
        assert_eq!(manifest.team.sprint, "none");
        assert_eq!(
            manifest.communication.inbox,
            PathBuf::from("/work/demo/.acp/messages/inbox/agent-x")
        );
        assert_eq!(
            manifest.communication.broadcast,
            PathBuf::from("/work/demo/.acp/messages/broadcast")
        );
        assert_eq!(manifest.context.load_files[0], PathBuf::from("/work/demo/README.md"));
        assert_eq!(manifest.constraints.max_task_duration, "4h");
        assert_eq!(manifest.constraints.can_deploy_to, vec!["dev"]);
    }
}
