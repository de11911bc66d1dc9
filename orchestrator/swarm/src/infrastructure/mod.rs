// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod mailbox;

pub use mailbox::{Delivery, FileMailbox, Mailbox, MailboxBatch, MailboxError, RejectedEntry};
