// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Slot Claim Use Case
//!
//! Application service that admits agents into slots and releases them.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Orchestrate load → validate → mutate → save of slot records
//! - **Collaborators:**
//!   - Domain: Slot aggregate (admission checks), Agent, RoleManifest
//!   - Infrastructure: SlotRepository, AgentRepository, ProjectRepository, LockManager
//!
//! # Flow (claim)
//!
//! 1. Load the project descriptor (fails with `NotInitialized`)
//! 2. Take the slot lock
//! 3. Load the slot and run the admission checks in order:
//!    not found, unavailable, full, provider, model
//! 4. Append the claim, persist the agent record under its own lock, persist
//!    the slot
//! 5. Build and persist the role manifest
//! 6. Release the slot lock
//!
//! A failed check leaves every record untouched. If the slot save fails
//! after the agent record was written, the agent record is removed again; if
//! the manifest save fails, the claim is withdrawn as well.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::application::presence::AgentPresence;
use crate::application::role_manifest::RoleManifestBuilder;
use crate::domain::agent::{Agent, AgentId, AgentProvider};
use crate::domain::lock::{agent_resource, slot_resource, LockManager, LockToken};
use crate::domain::manifest::RoleManifest;
use crate::domain::project::Project;
use crate::domain::repository::{
    AgentRepository, ProjectRepository, RepositoryError, SlotRepository,
};
use crate::domain::slot::{ClaimError, Slot, SlotClaim, SlotId, SlotStatus};
use crate::domain::task::to_base36;

/// Input to [`SlotClaimService::claim`].
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub slot_id: SlotId,
    pub provider: AgentProvider,
    /// Falls back to the slot's first approved model.
    pub model: Option<String>,
    /// Falls back to the slot id.
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub agent_id: AgentId,
    pub session_key: String,
    pub role: String,
    pub model: String,
    pub manifest: RoleManifest,
}

#[async_trait]
pub trait SlotClaimService: Send + Sync {
    /// Admit an agent into a slot.
    ///
    /// # Errors
    ///
    /// `SlotNotFound`, `SlotUnavailable`, `SlotFull`, `ProviderNotApproved`,
    /// `ModelNotApproved`, or a wrapped `RepositoryError`.
    async fn claim(&self, request: ClaimRequest) -> Result<ClaimOutcome, ClaimError>;

    /// Move a current claim into the slot's history.
    ///
    /// Without a session key the sole current claim is released.
    async fn release(
        &self,
        slot_id: &SlotId,
        session_key: Option<&str>,
    ) -> Result<SlotClaim, ClaimError>;

    async fn create_slot(&self, slot: Slot) -> Result<Slot, ClaimError>;

    /// Delete a slot; slots with active claims need `force`.
    async fn delete_slot(&self, slot_id: &SlotId, force: bool) -> Result<(), ClaimError>;

    async fn get_slot(&self, slot_id: &SlotId) -> Result<Slot, ClaimError>;

    async fn list_slots(&self) -> Result<Vec<Slot>, ClaimError>;
}

/// `main-<slotId>-<base36 millis><base36 sub-millisecond nanos>`, made unique
/// against keys already recorded on the slot.
pub fn generate_session_key(slot: &Slot, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u128;
    let sub_millis = u128::from(now.timestamp_subsec_nanos() % 1_000_000);
    let base = format!("main-{}-{}{}", slot.id, to_base36(millis), to_base36(sub_millis));

    let taken = |key: &str| {
        slot.current_claims
            .iter()
            .chain(slot.claim_history.iter())
            .any(|c| c.session_key == key)
    };

    if !taken(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

pub struct StandardSlotClaimService {
    slots: Arc<dyn SlotRepository>,
    agents: Arc<dyn AgentRepository>,
    projects: Arc<dyn ProjectRepository>,
    locks: Arc<dyn LockManager>,
    manifests: RoleManifestBuilder,
    presence: AgentPresence,
}

impl StandardSlotClaimService {
    pub fn new(
        slots: Arc<dyn SlotRepository>,
        agents: Arc<dyn AgentRepository>,
        projects: Arc<dyn ProjectRepository>,
        locks: Arc<dyn LockManager>,
        manifests: RoleManifestBuilder,
    ) -> Self {
        let presence = AgentPresence::new(agents.clone(), locks.clone());
        Self {
            slots,
            agents,
            projects,
            locks,
            manifests,
            presence,
        }
    }

    async fn unlock(&self, token: LockToken) {
        let resource = token.resource_id.clone();
        if let Err(e) = self.locks.release(token).await {
            warn!(resource = %resource, error = %e, "Failed to release lock");
        }
    }

    async fn load_slot(&self, slot_id: &SlotId) -> Result<Slot, ClaimError> {
        self.slots
            .find_by_id(slot_id)
            .await?
            .ok_or_else(|| ClaimError::SlotNotFound(slot_id.clone()))
    }

    async fn claimed_slot_ids(&self, current: &Slot) -> Vec<String> {
        match self.slots.list_all().await {
            Ok(slots) => slots
                .into_iter()
                .map(|s| if s.id == current.id { current.clone() } else { s })
                .filter(|s| s.status == SlotStatus::Claimed)
                .map(|s| s.id.to_string())
                .collect(),
            Err(e) => {
                warn!(error = %e, "Could not list slots for teammates; using own slot only");
                vec![current.id.to_string()]
            }
        }
    }

    async fn claim_locked(
        &self,
        request: &ClaimRequest,
        project: &Project,
    ) -> Result<ClaimOutcome, ClaimError> {
        let now = Utc::now();
        let mut slot = self.load_slot(&request.slot_id).await?;
        let model = slot.check_admission(request.provider, request.model.as_deref(), now)?;

        let session_key = generate_session_key(&slot, now);
        slot.admit(SlotClaim::new(
            session_key.clone(),
            request.provider,
            model.clone(),
            now,
        ))?;

        let agent_id = self
            .register_agent(request, &slot, &model, &session_key, now)
            .await?;

        if let Err(e) = self.slots.save(&mut slot).await {
            warn!(slot_id = %slot.id, agent_id = %agent_id, error = %e, "Slot save failed; removing agent record");
            self.discard_agent(&agent_id).await;
            return Err(e.into());
        }

        let teammates = self.claimed_slot_ids(&slot).await;
        let manifest = self
            .manifests
            .build(&agent_id, &slot, &session_key, project, teammates);
        if let Err(e) = self.agents.save_manifest(&agent_id, &manifest).await {
            warn!(slot_id = %slot.id, agent_id = %agent_id, error = %e, "Manifest save failed; withdrawing claim");
            slot.withdraw(&session_key);
            if let Err(undo) = self.slots.save(&mut slot).await {
                error!(slot_id = %slot.id, session_key = %session_key, error = %undo, "Failed to withdraw claim; release it manually");
            }
            self.discard_agent(&agent_id).await;
            return Err(e.into());
        }

        Ok(ClaimOutcome {
            agent_id,
            session_key,
            role: slot.role.clone(),
            model,
            manifest,
        })
    }

    /// Persist the agent record for a claim on `slot`.
    ///
    /// An agent id whose record is bound to a session that is still a current
    /// claim is never overwritten. An explicit name in that state is
    /// `AgentInUse`; the default id (the slot id) moves on to `<slot>-2`,
    /// `<slot>-3` and so on.
    async fn register_agent(
        &self,
        request: &ClaimRequest,
        slot: &Slot,
        model: &str,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> Result<AgentId, ClaimError> {
        let base = request
            .agent_name
            .clone()
            .unwrap_or_else(|| slot.id.to_string());

        let mut suffix = 1u32;
        loop {
            let agent_id = if suffix == 1 {
                AgentId::new(base.clone())
            } else {
                AgentId::new(format!("{}-{}", base, suffix))
            };

            let token = self.locks.acquire(&agent_resource(&agent_id)).await?;
            let result = async {
                if let Some(existing) = self.agents.find_by_id(&agent_id).await? {
                    if self.holds_current_claim(&existing, slot).await? {
                        return Ok(Some(existing.slot_id));
                    }
                }
                let agent = Agent::new(
                    agent_id.clone(),
                    slot.id.clone(),
                    slot.role.clone(),
                    request.provider,
                    model,
                    session_key,
                    now,
                );
                self.agents.save(&agent).await?;
                Ok::<_, ClaimError>(None)
            }
            .await;
            self.unlock(token).await;

            match result? {
                None => return Ok(agent_id),
                Some(bound_to) if request.agent_name.is_some() => {
                    return Err(ClaimError::AgentInUse {
                        agent: agent_id,
                        slot: bound_to,
                    })
                }
                Some(_) => {
                    debug!(agent_id = %agent_id, "Agent id in use; trying the next suffix");
                    suffix += 1;
                }
            }
        }
    }

    /// Whether `agent`'s session is still among its slot's current claims.
    /// `current` is the slot being claimed, already holding the new claim.
    async fn holds_current_claim(&self, agent: &Agent, current: &Slot) -> Result<bool, ClaimError> {
        let Some(key) = agent.session_key.as_deref() else {
            return Ok(false);
        };
        let bound = if agent.slot_id == current.id {
            Some(current.clone())
        } else {
            self.slots.find_by_id(&agent.slot_id).await?
        };
        Ok(bound.is_some_and(|s| s.current_claims.iter().any(|c| c.session_key == key)))
    }

    async fn discard_agent(&self, agent_id: &AgentId) {
        if let Err(e) = self.agents.delete(agent_id).await {
            warn!(agent_id = %agent_id, error = %e, "Failed to remove orphan agent record");
        }
    }

    async fn release_locked(
        &self,
        slot_id: &SlotId,
        session_key: Option<&str>,
    ) -> Result<SlotClaim, ClaimError> {
        let mut slot = self.load_slot(slot_id).await?;
        let claim = slot.release(session_key, Utc::now())?;
        self.slots.save(&mut slot).await?;
        Ok(claim)
    }

    async fn mark_session_offline(&self, slot_id: &SlotId, session_key: &str) {
        let agents = match self.agents.list_all().await {
            Ok(agents) => agents,
            Err(e) => {
                warn!(slot_id = %slot_id, error = %e, "Could not list agents after release");
                return;
            }
        };

        for agent in agents
            .into_iter()
            .filter(|a| a.session_key.as_deref() == Some(session_key))
        {
            match self.presence.mark_offline(&agent.id).await {
                Ok(_) => debug!(agent_id = %agent.id, "Agent marked offline"),
                Err(e) => warn!(agent_id = %agent.id, error = %e, "Failed to mark agent offline"),
            }
        }
    }
}

#[async_trait]
impl SlotClaimService for StandardSlotClaimService {
    async fn claim(&self, request: ClaimRequest) -> Result<ClaimOutcome, ClaimError> {
        info!(slot_id = %request.slot_id, provider = %request.provider, "Claiming slot");

        let project = self.projects.load().await?;
        let token = self.locks.acquire(&slot_resource(&request.slot_id)).await?;
        let result = self.claim_locked(&request, &project).await;
        self.unlock(token).await;

        match &result {
            Ok(outcome) => {
                metrics::counter!("acp_slot_claims_total", "result" => "admitted").increment(1);
                info!(
                    slot_id = %request.slot_id,
                    agent_id = %outcome.agent_id,
                    session_key = %outcome.session_key,
                    "Slot claimed"
                );
            }
            Err(e) => {
                metrics::counter!("acp_slot_claims_total", "result" => "rejected").increment(1);
                info!(slot_id = %request.slot_id, error = %e, "Slot claim rejected");
            }
        }
        result
    }

    async fn release(
        &self,
        slot_id: &SlotId,
        session_key: Option<&str>,
    ) -> Result<SlotClaim, ClaimError> {
        let token = self.locks.acquire(&slot_resource(slot_id)).await?;
        let result = self.release_locked(slot_id, session_key).await;
        self.unlock(token).await;

        let claim = result?;
        metrics::counter!("acp_slot_releases_total").increment(1);
        info!(slot_id = %slot_id, session_key = %claim.session_key, "Slot released");

        self.mark_session_offline(slot_id, &claim.session_key).await;
        Ok(claim)
    }

    async fn create_slot(&self, mut slot: Slot) -> Result<Slot, ClaimError> {
        slot.validate()?;
        slot.revision = 0;

        let token = self.locks.acquire(&slot_resource(&slot.id)).await?;
        let result = async {
            if self.slots.find_by_id(&slot.id).await?.is_some() {
                return Err(ClaimError::Repository(RepositoryError::AlreadyExists(
                    format!("slot {}", slot.id),
                )));
            }
            self.slots.save(&mut slot).await?;
            Ok(slot)
        }
        .await;
        self.unlock(token).await;

        if let Ok(slot) = &result {
            info!(slot_id = %slot.id, role = %slot.role, "Slot created");
        }
        result
    }

    async fn delete_slot(&self, slot_id: &SlotId, force: bool) -> Result<(), ClaimError> {
        let token = self.locks.acquire(&slot_resource(slot_id)).await?;
        let result = async {
            let slot = self.load_slot(slot_id).await?;
            if !slot.current_claims.is_empty() && !force {
                return Err(ClaimError::SlotInUse {
                    slot: slot_id.clone(),
                    active: slot.current_claims.len(),
                });
            }
            self.slots.delete(slot_id).await?;
            Ok(())
        }
        .await;
        self.unlock(token).await;

        if result.is_ok() {
            info!(slot_id = %slot_id, force, "Slot deleted");
        }
        result
    }

    async fn get_slot(&self, slot_id: &SlotId) -> Result<Slot, ClaimError> {
        self.load_slot(slot_id).await
    }

    async fn list_slots(&self) -> Result<Vec<Slot>, ClaimError> {
        Ok(self.slots.list_all().await?)
    }
}
