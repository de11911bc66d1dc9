// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the ACP CLIs

pub mod agent;
pub mod config;
pub mod init;
pub mod message;
pub mod session;
pub mod slot;
pub mod status;
pub mod task;

pub use self::agent::AgentCommand;
pub use self::config::ConfigCommand;
pub use self::message::MessageCommand;
pub use self::slot::SlotCommand;
pub use self::task::TaskCommand;
