// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `acp-swarm` — Agent Messaging Crate
//!
//! Per-agent directory mailboxes and the worker loop that consumes them.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Message`, `MessageId`, `MessageType` |
//! | [`infrastructure`] | Infrastructure | `Mailbox` trait, `FileMailbox` |
//! | [`application`] | Application | `WorkerLoop`, `MessageHandler`, `StopHandle` |
//!
//! ## Key Concepts
//!
//! - **Mailbox**: a directory per agent. Enqueue is an atomic file write;
//!   acknowledgement moves the file into `read/`, never deletes it.
//! - **Delivery**: at-least-once. A message is acknowledged only after its
//!   handler ran, so handlers must tolerate redelivery.
//! - **Cancellation**: cooperative. The stop flag is checked between cycles,
//!   never in the middle of a batch.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
