// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod atomic;
pub mod layout;
pub mod lock;
pub mod repositories;

pub use layout::CoordinationLayout;
pub use lock::{FileLockManager, InMemoryLockManager};
