// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Role Manifest
//!
//! Immutable snapshot handed to an agent when it claims a slot. The worker
//! loop reads its mailbox paths from here for the whole session.
//!
//! The JSON shape (camelCase, `manifestVersion: "1.0"`) is the on-disk format
//! stored at `agents/<agentId>/manifest.json`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AssignTasks,
    ApproveChanges,
    SubmitCode,
    ReviewCode,
    DeployToDev,
    DeployToStaging,
    DeployToProd,
    Escalate,
    OverrideDecisions,
    ManageAgents,
    ViewAllTasks,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::AssignTasks => "assign_tasks",
            Permission::ApproveChanges => "approve_changes",
            Permission::SubmitCode => "submit_code",
            Permission::ReviewCode => "review_code",
            Permission::DeployToDev => "deploy_to_dev",
            Permission::DeployToStaging => "deploy_to_staging",
            Permission::DeployToProd => "deploy_to_prod",
            Permission::Escalate => "escalate",
            Permission::OverrideDecisions => "override_decisions",
            Permission::ManageAgents => "manage_agents",
            Permission::ViewAllTasks => "view_all_tasks",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleManifest {
    pub manifest_version: String,
    pub agent: ManifestAgent,
    pub role: ManifestRole,
    pub team: ManifestTeam,
    pub communication: ManifestCommunication,
    pub context: ManifestContext,
    pub constraints: ManifestConstraints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAgent {
    pub id: String,
    pub slot_id: String,
    pub session_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRole {
    pub id: String,
    pub title: String,
    pub responsibilities: Vec<String>,
    pub permissions: Vec<Permission>,
    pub escalation_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTeam {
    pub project: String,
    pub sprint: String,
    pub reports_to: String,
    pub teammates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCommunication {
    pub inbox: PathBuf,
    pub outbox: PathBuf,
    pub broadcast: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestContext {
    pub load_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConstraints {
    pub max_task_duration: String,
    pub requires_review: bool,
    pub can_deploy_to: Vec<String>,
}

impl RoleManifest {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.permissions.contains(&permission)
    }
}

/// `backend-developer` → `Backend Developer`.
pub fn role_title(role: &str) -> String {
    role.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
