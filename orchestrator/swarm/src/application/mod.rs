// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drives an agent's mailbox through the worker loop

pub mod worker;

pub use worker::{
    shutdown_signal, CycleOutcome, MessageHandler, StandardMessageHandler, StopHandle, WorkerLoop,
    WorkerReport, WorkerSettings, WorkerState,
};
