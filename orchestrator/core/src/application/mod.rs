// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod presence;
pub mod role_manifest;
pub mod slot_claim;
pub mod task;

// Re-export use cases for convenience
pub use presence::AgentPresence;
pub use role_manifest::RoleManifestBuilder;
pub use slot_claim::{ClaimOutcome, ClaimRequest, SlotClaimService, StandardSlotClaimService};
pub use task::{NewTask, TaskService};
