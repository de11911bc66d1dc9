// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Core of the Agent Coordination Protocol: slot claims, agent records, role
//! manifests and the file-backed stores under the coordination directory.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services, file persistence

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
