// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Directory Mailbox
//!
//! One directory per agent. Senders drop `<messageId>.json` files into it;
//! the owning worker polls, handles, then acknowledges by moving each file
//! into `read/`. Files that cannot be parsed are moved into `rejected/` so
//! they are not retried forever.
//!
//! ```text
//! <inbox>/<messageId>.json
//! <inbox>/read/<messageId>.json
//! <inbox>/rejected/<file>
//! ```

use std::path::{Path, PathBuf};

use acp_core::infrastructure::atomic::write_atomic;
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::message::Message;

pub const READ_DIR: &str = "read";
pub const REJECTED_DIR: &str = "rejected";

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox unavailable: {0}")]
    MailboxUnavailable(PathBuf),

    #[error("Mailbox I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MailboxError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        MailboxError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A parsed message together with the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: Message,
    pub path: PathBuf,
}

/// An inbox file that could not be parsed as a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct MailboxBatch {
    /// Ascending by timestamp, ties broken by message id.
    pub deliveries: Vec<Delivery>,
    pub rejected: Vec<RejectedEntry>,
}

impl MailboxBatch {
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && self.rejected.is_empty()
    }
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Create the inbox and its `read/` sub-area.
    async fn ensure(&self, inbox: &Path) -> Result<(), MailboxError>;

    /// Atomically write `message` into `inbox`, creating it if missing.
    async fn enqueue(&self, inbox: &Path, message: &Message) -> Result<PathBuf, MailboxError>;

    /// Pending messages. A missing inbox is `MailboxUnavailable`.
    async fn poll(&self, inbox: &Path) -> Result<MailboxBatch, MailboxError>;

    /// Move a handled message into `read/`.
    async fn ack(&self, inbox: &Path, delivery: &Delivery) -> Result<(), MailboxError>;

    /// Move an unparseable file into `rejected/`.
    async fn reject(&self, inbox: &Path, entry: &RejectedEntry) -> Result<(), MailboxError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileMailbox;

impl FileMailbox {
    pub fn new() -> Self {
        Self
    }

    async fn relocate(&self, inbox: &Path, file: &Path, area: &str) -> Result<PathBuf, MailboxError> {
        let target_dir = inbox.join(area);
        fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| MailboxError::io(&target_dir, e))?;

        let file_name = file
            .file_name()
            .ok_or_else(|| MailboxError::io(file, std::io::Error::other("path has no file name")))?;
        let target = target_dir.join(file_name);
        fs::rename(file, &target)
            .await
            .map_err(|e| MailboxError::io(file, e))?;
        Ok(target)
    }
}

fn is_candidate(name: &str) -> bool {
    name.ends_with(".json") && !name.starts_with('.')
}

#[async_trait]
impl Mailbox for FileMailbox {
    async fn ensure(&self, inbox: &Path) -> Result<(), MailboxError> {
        let read = inbox.join(READ_DIR);
        fs::create_dir_all(&read)
            .await
            .map_err(|e| MailboxError::io(&read, e))
    }

    async fn enqueue(&self, inbox: &Path, message: &Message) -> Result<PathBuf, MailboxError> {
        let path = inbox.join(message.file_name());
        let json = serde_json::to_vec_pretty(message)?;
        write_atomic(&path, &json)
            .await
            .map_err(|e| MailboxError::io(&path, e))?;
        debug!(inbox = %inbox.display(), message_id = %message.id, "Message enqueued");
        Ok(path)
    }

    async fn poll(&self, inbox: &Path) -> Result<MailboxBatch, MailboxError> {
        let mut entries = match fs::read_dir(inbox).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MailboxError::MailboxUnavailable(inbox.to_path_buf()))
            }
            Err(e) => return Err(MailboxError::io(inbox, e)),
        };

        let mut batch = MailboxBatch::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MailboxError::io(inbox, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_candidate(&name) {
                continue;
            }
            let path = entry.path();
            match entry.file_type().await {
                Ok(ft) if ft.is_file() => {}
                _ => continue,
            }

            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                // Acked or removed between listing and reading.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(MailboxError::io(&path, e)),
            };

            match serde_json::from_str::<Message>(&content) {
                Ok(message) => batch.deliveries.push(Delivery { message, path }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unparseable message in inbox");
                    batch.rejected.push(RejectedEntry {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        batch.deliveries.sort_by(|a, b| {
            a.message
                .timestamp
                .cmp(&b.message.timestamp)
                .then_with(|| a.message.id.cmp(&b.message.id))
        });
        Ok(batch)
    }

    async fn ack(&self, inbox: &Path, delivery: &Delivery) -> Result<(), MailboxError> {
        let target = self.relocate(inbox, &delivery.path, READ_DIR).await?;
        debug!(message_id = %delivery.message.id, path = %target.display(), "Message acknowledged");
        Ok(())
    }

    async fn reject(&self, inbox: &Path, entry: &RejectedEntry) -> Result<(), MailboxError> {
        let target = self.relocate(inbox, &entry.path, REJECTED_DIR).await?;
        warn!(path = %target.display(), reason = %entry.reason, "Message rejected");
        Ok(())
    }
}
