// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Slot Aggregate
//!
//! A [`Slot`] is a named, capacity-bounded grant of execution rights. Humans
//! define the constraints (approved providers, approved models, concurrency);
//! agents occupy the slot through [`SlotClaim`]s.
//!
//! ## Invariants
//!
//! - `current_claims.len() <= max_concurrent`
//! - for `Available`/`Claimed`, `status == Claimed` iff `current_claims` is non-empty
//! - a claim moves from `current_claims` to `claim_history` exactly once, on release
//!
//! All admission checks live on the aggregate so that the application layer
//! only orchestrates load → validate → mutate → save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::agent::{AgentId, AgentProvider};
use crate::domain::repository::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    #[default]
    Available,
    Claimed,
    Suspended,
    Expired,
}

impl SlotStatus {
    /// Suspended and expired slots are administrative states that block new claims.
    pub fn accepts_claims(&self) -> bool {
        matches!(self, SlotStatus::Available | SlotStatus::Claimed)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotStatus::Available => "available",
            SlotStatus::Claimed => "claimed",
            SlotStatus::Suspended => "suspended",
            SlotStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SlotStatus::Available),
            "claimed" => Ok(SlotStatus::Claimed),
            "suspended" => Ok(SlotStatus::Suspended),
            "expired" => Ok(SlotStatus::Expired),
            other => Err(format!("unknown slot status '{}'", other)),
        }
    }
}

/// One agent's occupancy of a slot for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotClaim {
    pub session_key: String,
    pub provider: AgentProvider,
    pub model: String,
    pub claimed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks_completed: u32,
    #[serde(default = "default_uptime")]
    pub uptime: String,
}

impl SlotClaim {
    pub fn new(
        session_key: impl Into<String>,
        provider: AgentProvider,
        model: impl Into<String>,
        claimed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            provider,
            model: model.into(),
            claimed_at,
            released_at: None,
            tasks_completed: 0,
            uptime: default_uptime(),
        }
    }
}

fn default_uptime() -> String {
    "0%".to_string()
}

fn default_max_concurrent() -> u32 {
    1
}

/// Aggregate root for slot occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: SlotId,
    #[serde(default)]
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub status: SlotStatus,

    pub approved_providers: Vec<AgentProvider>,
    pub approved_models: Vec<String>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_agents: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_renew: Option<bool>,

    #[serde(default)]
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub current_claims: Vec<SlotClaim>,
    #[serde(default)]
    pub claim_history: Vec<SlotClaim>,

    /// Optimistic concurrency counter, bumped by every successful save.
    #[serde(default)]
    pub revision: u64,
}

impl Slot {
    pub fn new(
        id: SlotId,
        role: impl Into<String>,
        approved_providers: Vec<AgentProvider>,
        approved_models: Vec<String>,
        max_concurrent: u32,
    ) -> Self {
        Self {
            name: id.0.clone(),
            id,
            role: role.into(),
            status: SlotStatus::Available,
            approved_providers,
            approved_models,
            max_concurrent,
            min_agents: None,
            expires_at: None,
            auto_renew: None,
            approved: false,
            approved_by: None,
            approved_at: None,
            current_claims: Vec::new(),
            claim_history: Vec::new(),
            revision: 0,
        }
    }

    /// Mark the slot as approved by a human operator.
    pub fn approve(&mut self, approved_by: impl Into<String>, at: DateTime<Utc>) {
        self.approved = true;
        self.approved_by = Some(approved_by.into());
        self.approved_at = Some(at);
    }

    /// Structural validation applied on create and on load.
    pub fn validate(&self) -> Result<(), ClaimError> {
        if self.id.0.trim().is_empty() {
            return Err(ClaimError::InvalidSlot("slot id cannot be empty".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(ClaimError::InvalidSlot(format!(
                "slot {} must allow at least one concurrent claim",
                self.id
            )));
        }
        if self.approved_providers.is_empty() {
            return Err(ClaimError::InvalidSlot(format!(
                "slot {} has no approved providers",
                self.id
            )));
        }
        if self.approved_models.is_empty() {
            return Err(ClaimError::InvalidSlot(format!(
                "slot {} has no approved models",
                self.id
            )));
        }
        Ok(())
    }

    pub fn has_capacity(&self) -> bool {
        (self.current_claims.len() as u64) < u64::from(self.max_concurrent)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Expired || self.expires_at.is_some_and(|at| at <= now)
    }

    /// The model used when a claimant does not ask for one.
    pub fn default_model(&self) -> Option<&str> {
        self.approved_models.first().map(String::as_str)
    }

    /// Run the admission checks in their contractual order and return the
    /// resolved model. Does not mutate the slot.
    pub fn check_admission(
        &self,
        provider: AgentProvider,
        requested_model: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, ClaimError> {
        if !self.status.accepts_claims() || self.is_expired_at(now) {
            return Err(ClaimError::SlotUnavailable {
                slot: self.id.clone(),
                status: if self.is_expired_at(now) {
                    SlotStatus::Expired
                } else {
                    self.status
                },
            });
        }

        if !self.has_capacity() {
            return Err(ClaimError::SlotFull {
                slot: self.id.clone(),
                active: self.current_claims.len(),
                max: self.max_concurrent,
            });
        }

        if !self.approved_providers.contains(&provider) {
            return Err(ClaimError::ProviderNotApproved {
                provider,
                allowed: self.approved_providers.clone(),
            });
        }

        let model = requested_model
            .or_else(|| self.default_model())
            .unwrap_or_default()
            .to_string();
        if !self.approved_models.iter().any(|m| *m == model) {
            return Err(ClaimError::ModelNotApproved {
                slot: self.id.clone(),
                model,
            });
        }

        Ok(model)
    }

    /// Append a claim after [`Slot::check_admission`] succeeded.
    pub fn admit(&mut self, claim: SlotClaim) -> Result<(), ClaimError> {
        if !self.has_capacity() {
            return Err(ClaimError::SlotFull {
                slot: self.id.clone(),
                active: self.current_claims.len(),
                max: self.max_concurrent,
            });
        }
        self.current_claims.push(claim);
        self.status = SlotStatus::Claimed;
        Ok(())
    }

    /// Drop a claim that was admitted but never handed to an agent. Unlike
    /// [`Slot::release`] nothing is recorded in the history.
    pub fn withdraw(&mut self, session_key: &str) -> bool {
        let before = self.current_claims.len();
        self.current_claims.retain(|c| c.session_key != session_key);
        if self.current_claims.is_empty() && self.status == SlotStatus::Claimed {
            self.status = SlotStatus::Available;
        }
        before != self.current_claims.len()
    }

    /// Move a current claim into the history.
    ///
    /// Without a session key the sole current claim is released; with more
    /// than one active claim a key is required.
    pub fn release(
        &mut self,
        session_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SlotClaim, ClaimError> {
        let index = match session_key {
            Some(key) => self
                .current_claims
                .iter()
                .position(|c| c.session_key == key)
                .ok_or_else(|| ClaimError::ClaimNotFound {
                    slot: self.id.clone(),
                    session_key: Some(key.to_string()),
                })?,
            None => match self.current_claims.len() {
                0 => {
                    return Err(ClaimError::ClaimNotFound {
                        slot: self.id.clone(),
                        session_key: None,
                    })
                }
                1 => 0,
                active => {
                    return Err(ClaimError::SessionKeyRequired {
                        slot: self.id.clone(),
                        active,
                    })
                }
            },
        };

        let mut claim = self.current_claims.remove(index);
        claim.released_at = Some(now);
        self.claim_history.push(claim.clone());

        if self.current_claims.is_empty() && self.status == SlotStatus::Claimed {
            self.status = SlotStatus::Available;
        }

        Ok(claim)
    }
}

/// Errors raised by the claim/release protocol.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Slot {0} not found")]
    SlotNotFound(SlotId),

    #[error("Slot {slot} is {status} and cannot be claimed")]
    SlotUnavailable { slot: SlotId, status: SlotStatus },

    #[error("Slot {slot} is already claimed by {active} agent(s) (max {max})")]
    SlotFull { slot: SlotId, active: usize, max: u32 },

    #[error("Provider {provider} not approved for this slot. Allowed: {}", join_providers(.allowed))]
    ProviderNotApproved {
        provider: AgentProvider,
        allowed: Vec<AgentProvider>,
    },

    #[error("Model {model} not approved for slot {slot}")]
    ModelNotApproved { slot: SlotId, model: String },

    #[error("No active claim on slot {slot}{}", for_session(.session_key))]
    ClaimNotFound {
        slot: SlotId,
        session_key: Option<String>,
    },

    #[error("Slot {slot} has {active} active claims; a session key is required to release one")]
    SessionKeyRequired { slot: SlotId, active: usize },

    #[error("Slot {slot} has {active} active claim(s); release them or force the deletion")]
    SlotInUse { slot: SlotId, active: usize },

    #[error("Agent {agent} already holds an active claim on slot {slot}")]
    AgentInUse { agent: AgentId, slot: SlotId },

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn for_session(session_key: &Option<String>) -> String {
    session_key
        .as_ref()
        .map(|k| format!(" for session {}", k))
        .unwrap_or_default()
}

fn join_providers(providers: &[AgentProvider]) -> String {
    providers
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
