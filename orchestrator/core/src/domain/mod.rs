// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Aggregates, value objects and repository contracts for agent coordination.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Slot occupancy rules, agent identity, role manifests, tasks

pub mod agent;
pub mod coordination_config;
pub mod lock;
pub mod manifest;
pub mod project;
pub mod repository;
pub mod slot;
pub mod task;
