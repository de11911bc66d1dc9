// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the slot claim/release protocol against the
//! file-backed stores in a temporary project root.

use std::sync::Arc;
use std::time::Duration;

use acp_core::application::role_manifest::RoleManifestBuilder;
use acp_core::application::slot_claim::{ClaimRequest, SlotClaimService, StandardSlotClaimService};
use acp_core::domain::agent::{Agent, AgentId, AgentProvider, AgentStatus};
use acp_core::domain::coordination_config::{ConstraintDefaults, LockConfig, RoleDefaults};
use acp_core::domain::manifest::{Permission, RoleManifest};
use acp_core::domain::repository::{AgentRepository, RepositoryError, SlotRepository};
use acp_core::domain::slot::{ClaimError, Slot, SlotId, SlotStatus};
use acp_core::infrastructure::layout::CoordinationLayout;
use acp_core::infrastructure::lock::FileLockManager;
use acp_core::infrastructure::repositories::{
    FileAgentRepository, FileProjectRepository, FileSlotRepository,
};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio_test::assert_ok;

struct Harness {
    _dir: TempDir,
    layout: CoordinationLayout,
    slots: Arc<FileSlotRepository>,
    agents: Arc<FileAgentRepository>,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = CoordinationLayout::with_defaults(dir.path());
        FileProjectRepository::new(layout.clone())
            .initialize()
            .await
            .unwrap();
        Self {
            slots: Arc::new(FileSlotRepository::new(layout.clone())),
            agents: Arc::new(FileAgentRepository::new(layout.clone())),
            layout,
            _dir: dir,
        }
    }

    /// A fresh service instance, as a separate CLI process would build it.
    fn service(&self) -> StandardSlotClaimService {
        self.service_with_agents(Arc::new(FileAgentRepository::new(self.layout.clone())))
    }

    fn service_with_agents(&self, agents: Arc<dyn AgentRepository>) -> StandardSlotClaimService {
        let locks = FileLockManager::new(
            self.layout.locks_dir(),
            LockConfig {
                stale_after: Duration::from_secs(30),
                retry_attempts: 200,
                retry_delay: Duration::from_millis(5),
            },
        );
        StandardSlotClaimService::new(
            Arc::new(FileSlotRepository::new(self.layout.clone())),
            agents,
            Arc::new(FileProjectRepository::new(self.layout.clone())),
            Arc::new(locks),
            RoleManifestBuilder::new(
                self.layout.clone(),
                ConstraintDefaults::default(),
                RoleDefaults::default(),
            ),
        )
    }

    async fn add_slot(&self, id: &str, max: u32) {
        let slot = Slot::new(
            SlotId::new(id),
            "backend-developer",
            vec![AgentProvider::Openclaw],
            vec!["m1".to_string()],
            max,
        );
        self.service().create_slot(slot).await.unwrap();
    }

    async fn slot(&self, id: &str) -> Slot {
        self.slots.find_by_id(&SlotId::new(id)).await.unwrap().unwrap()
    }
}

/// Agent store whose manifest writes always fail.
struct ManifestWriteFails(FileAgentRepository);

#[async_trait]
impl AgentRepository for ManifestWriteFails {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.0.save(agent).await
    }

    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        self.0.find_by_id(id).await
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        self.0.list_all().await
    }

    async fn delete(&self, id: &AgentId) -> Result<(), RepositoryError> {
        self.0.delete(id).await
    }

    async fn save_manifest(&self, _id: &AgentId, _manifest: &RoleManifest) -> Result<(), RepositoryError> {
        Err(RepositoryError::Io("disk full".to_string()))
    }

    async fn find_manifest(&self, id: &AgentId) -> Result<Option<RoleManifest>, RepositoryError> {
        self.0.find_manifest(id).await
    }
}

fn unnamed(slot: &str) -> ClaimRequest {
    ClaimRequest {
        slot_id: SlotId::new(slot),
        provider: AgentProvider::Openclaw,
        model: None,
        agent_name: None,
    }
}

fn request(slot: &str, provider: AgentProvider, model: Option<&str>, name: &str) -> ClaimRequest {
    ClaimRequest {
        slot_id: SlotId::new(slot),
        provider,
        model: model.map(str::to_string),
        agent_name: Some(name.to_string()),
    }
}

#[tokio::test]
async fn test_scenario_single_slot_claim_then_full() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;
    let service = h.service();

    let outcome = service
        .claim(request("s1", AgentProvider::Openclaw, Some("m1"), "agent-x"))
        .await
        .unwrap();
    assert_eq!(outcome.agent_id, AgentId::new("agent-x"));
    assert!(outcome.manifest.has_permission(Permission::SubmitCode));
    assert_eq!(outcome.manifest.team.teammates, vec!["s1"]);

    let persisted = h
        .agents
        .find_manifest(&outcome.agent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted, outcome.manifest);

    let err = service
        .claim(request("s1", AgentProvider::Openclaw, Some("m1"), "agent-y"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::SlotFull { active: 1, max: 1, .. }));
    assert!(h.agents.find_by_id(&AgentId::new("agent-y")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_scenario_unapproved_provider_leaves_slot_untouched() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;
    let before = h.slots.read_raw(&SlotId::new("s1")).await.unwrap();

    let err = h
        .service()
        .claim(request("s1", AgentProvider::Claude, Some("m1"), "agent-z"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::ProviderNotApproved { .. }));

    let after = h.slots.read_raw(&SlotId::new("s1")).await.unwrap();
    assert_eq!(before, after);
    assert!(h.slot("s1").await.current_claims.is_empty());
    assert!(h.agents.find_by_id(&AgentId::new("agent-z")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_scenario_release_restores_available() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;
    let service = h.service();
    let outcome = service
        .claim(request("s1", AgentProvider::Openclaw, Some("m1"), "agent-x"))
        .await
        .unwrap();

    let released = service.release(&SlotId::new("s1"), None).await.unwrap();
    assert_eq!(released.session_key, outcome.session_key);

    let slot = h.slot("s1").await;
    assert_eq!(slot.status, SlotStatus::Available);
    assert!(slot.current_claims.is_empty());
    assert_eq!(slot.claim_history.len(), 1);
    assert!(slot.claim_history[0].released_at.is_some());

    let agent = h.agents.find_by_id(&outcome.agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);

    let err = service
        .release(&SlotId::new("s1"), Some(&outcome.session_key))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::ClaimNotFound { .. }));
    assert_eq!(h.slot("s1").await.claim_history.len(), 1);
}

#[tokio::test]
async fn test_exactly_n_admissions_then_full() {
    let h = Harness::new().await;
    h.add_slot("pool", 3).await;
    let service = h.service();

    for i in 0..3 {
        service
            .claim(request("pool", AgentProvider::Openclaw, None, &format!("agent-{}", i)))
            .await
            .unwrap();
    }
    let err = service
        .claim(request("pool", AgentProvider::Openclaw, None, "agent-3"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::SlotFull { active: 3, max: 3, .. }));

    let keys: Vec<_> = h
        .slot("pool")
        .await
        .current_claims
        .iter()
        .map(|c| c.session_key.clone())
        .collect();
    assert_eq!(keys.len(), 3);

    let err = service.release(&SlotId::new("pool"), None).await.unwrap_err();
    assert!(matches!(err, ClaimError::SessionKeyRequired { active: 3, .. }));
    assert_ok!(service.release(&SlotId::new("pool"), Some(&keys[1])).await);
    let remaining: Vec<_> = h
        .slot("pool")
        .await
        .current_claims
        .iter()
        .map(|c| c.session_key.clone())
        .collect();
    assert_eq!(remaining, vec![keys[0].clone(), keys[2].clone()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_never_over_admit() {
    let h = Arc::new(Harness::new().await);
    h.add_slot("race", 2).await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let service = h.service();
        handles.push(tokio::spawn(async move {
            service
                .claim(request("race", AgentProvider::Openclaw, None, &format!("racer-{}", i)))
                .await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(ClaimError::SlotFull { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(admitted, 2);
    assert_eq!(h.slot("race").await.current_claims.len(), 2);
}

#[tokio::test]
async fn test_unknown_slot_and_model() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;
    let service = h.service();

    let err = service
        .claim(request("nope", AgentProvider::Openclaw, None, "a"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::SlotNotFound(_)));

    let err = service
        .claim(request("s1", AgentProvider::Openclaw, Some("gpt-x"), "a"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::ModelNotApproved { .. }));
}

#[tokio::test]
async fn test_claim_requires_initialized_project() {
    let dir = TempDir::new().unwrap();
    let layout = CoordinationLayout::with_defaults(dir.path());
    let service = StandardSlotClaimService::new(
        Arc::new(FileSlotRepository::new(layout.clone())),
        Arc::new(FileAgentRepository::new(layout.clone())),
        Arc::new(FileProjectRepository::new(layout.clone())),
        Arc::new(FileLockManager::new(layout.locks_dir(), LockConfig::default())),
        RoleManifestBuilder::new(layout, ConstraintDefaults::default(), RoleDefaults::default()),
    );

    let err = service
        .claim(request("s1", AgentProvider::Openclaw, None, "a"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Repository(RepositoryError::NotInitialized(_))
    ));
}

#[tokio::test]
async fn test_delete_claimed_slot_needs_force() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;
    let service = h.service();
    service
        .claim(request("s1", AgentProvider::Openclaw, None, "a"))
        .await
        .unwrap();

    let err = service.delete_slot(&SlotId::new("s1"), false).await.unwrap_err();
    assert!(matches!(err, ClaimError::SlotInUse { active: 1, .. }));

    service.delete_slot(&SlotId::new("s1"), true).await.unwrap();
    assert!(h.slots.find_by_id(&SlotId::new("s1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_duplicate_slot_is_rejected() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;
    let dup = Slot::new(
        SlotId::new("s1"),
        "qa",
        vec![AgentProvider::Codex],
        vec!["m2".to_string()],
        1,
    );
    let err = h.service().create_slot(dup).await.unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Repository(RepositoryError::AlreadyExists(_))
    ));
}

#[tokio::test]
async fn test_unnamed_claims_on_shared_slot_get_distinct_agents() {
    let h = Harness::new().await;
    h.add_slot("pool", 2).await;
    let service = h.service();

    let first = service.claim(unnamed("pool")).await.unwrap();
    let second = service.claim(unnamed("pool")).await.unwrap();
    assert_eq!(first.agent_id, AgentId::new("pool"));
    assert_eq!(second.agent_id, AgentId::new("pool-2"));
    assert_ne!(
        first.manifest.communication.inbox,
        second.manifest.communication.inbox
    );

    for outcome in [&first, &second] {
        let agent = h.agents.find_by_id(&outcome.agent_id).await.unwrap().unwrap();
        assert_eq!(agent.session_key.as_deref(), Some(outcome.session_key.as_str()));
        let manifest = h.agents.find_manifest(&outcome.agent_id).await.unwrap().unwrap();
        assert_eq!(manifest.agent.session_key, outcome.session_key);
    }
}

#[tokio::test]
async fn test_released_agent_id_is_reused() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;
    let service = h.service();

    let first = service.claim(unnamed("s1")).await.unwrap();
    service.release(&SlotId::new("s1"), None).await.unwrap();
    let second = service.claim(unnamed("s1")).await.unwrap();

    assert_eq!(first.agent_id, second.agent_id);
    let agent = h.agents.find_by_id(&second.agent_id).await.unwrap().unwrap();
    assert_eq!(agent.session_key.as_deref(), Some(second.session_key.as_str()));
}

#[tokio::test]
async fn test_named_agent_with_live_claim_cannot_move_slots() {
    let h = Harness::new().await;
    h.add_slot("pool", 2).await;
    h.add_slot("other", 1).await;
    let service = h.service();

    let held = service
        .claim(request("pool", AgentProvider::Openclaw, None, "bob"))
        .await
        .unwrap();
    let err = service
        .claim(request("other", AgentProvider::Openclaw, None, "bob"))
        .await
        .unwrap_err();
    match err {
        ClaimError::AgentInUse { agent, slot } => {
            assert_eq!(agent, AgentId::new("bob"));
            assert_eq!(slot, SlotId::new("pool"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let bob = h.agents.find_by_id(&AgentId::new("bob")).await.unwrap().unwrap();
    assert_eq!(bob.slot_id, SlotId::new("pool"));
    assert_eq!(bob.session_key.as_deref(), Some(held.session_key.as_str()));
    let other = h.slot("other").await;
    assert!(other.current_claims.is_empty());
    assert_eq!(other.status, SlotStatus::Available);

    service
        .release(&SlotId::new("pool"), Some(&held.session_key))
        .await
        .unwrap();
    let moved = service
        .claim(request("other", AgentProvider::Openclaw, None, "bob"))
        .await
        .unwrap();
    assert_eq!(moved.agent_id, AgentId::new("bob"));
}

#[tokio::test]
async fn test_manifest_failure_withdraws_claim() {
    let h = Harness::new().await;
    h.add_slot("s1", 1).await;

    let failing = h.service_with_agents(Arc::new(ManifestWriteFails(FileAgentRepository::new(
        h.layout.clone(),
    ))));
    let err = failing
        .claim(request("s1", AgentProvider::Openclaw, None, "agent-x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Repository(RepositoryError::Io(_))));

    let slot = h.slot("s1").await;
    assert!(slot.current_claims.is_empty());
    assert!(slot.claim_history.is_empty());
    assert_eq!(slot.status, SlotStatus::Available);
    assert!(h.agents.find_by_id(&AgentId::new("agent-x")).await.unwrap().is_none());

    assert_ok!(
        h.service()
            .claim(request("s1", AgentProvider::Openclaw, None, "agent-x"))
            .await
    );
}
