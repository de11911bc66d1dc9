// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Messaging Domain Layer
//!
//! Pure domain types for inter-agent messaging. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`message`] | `Message`, `MessageId`, `MessageType` |

pub mod message;

pub use message::*;
