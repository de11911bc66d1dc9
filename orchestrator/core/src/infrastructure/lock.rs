// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Advisory lock files.
//!
//! `locks/<resource>.lock` is created with `create_new` (`O_CREAT|O_EXCL`), so
//! exactly one process wins. The file records who holds it and when; locks
//! older than `staleAfter` are assumed abandoned and broken.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::coordination_config::LockConfig;
use crate::domain::lock::{LockManager, LockToken, ResourceLock};
use crate::domain::repository::RepositoryError;

/// `<pid>@<hostname>` for the current process.
pub fn current_holder() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}@{}", std::process::id(), host)
}

enum Attempt {
    Acquired(LockToken),
    Held(ResourceLock),
    /// Lock file exists but could not be parsed (a writer may be mid-write).
    Unreadable,
}

pub struct FileLockManager {
    locks_dir: PathBuf,
    policy: LockConfig,
    holder: String,
}

impl FileLockManager {
    pub fn new(locks_dir: impl Into<PathBuf>, policy: LockConfig) -> Self {
        Self {
            locks_dir: locks_dir.into(),
            policy,
            holder: current_holder(),
        }
    }

    fn lock_path(&self, resource: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", resource))
    }

    pub async fn read_lock(&self, resource: &str) -> Result<Option<ResourceLock>, RepositoryError> {
        match fs::read_to_string(self.lock_path(resource)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_stale(&self, lock: &ResourceLock) -> bool {
        let age = Utc::now().signed_duration_since(lock.acquired_at);
        // Negative age means clock skew between hosts; treat as fresh.
        age.to_std().is_ok_and(|age| age >= self.policy.stale_after)
    }

    async fn try_acquire(&self, resource: &str) -> Result<Attempt, RepositoryError> {
        let path = self.lock_path(resource);
        let lock = ResourceLock {
            resource_id: resource.to_string(),
            held_by: self.holder.clone(),
            acquired_at: Utc::now(),
            nonce: uuid::Uuid::new_v4().to_string(),
        };

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                let body = serde_json::to_vec(&lock)?;
                if let Err(e) = async {
                    file.write_all(&body).await?;
                    file.sync_all().await
                }
                .await
                {
                    let _ = fs::remove_file(&path).await;
                    return Err(e.into());
                }
                debug!(resource, holder = %lock.held_by, "Lock acquired");
                Ok(Attempt::Acquired(LockToken {
                    resource_id: lock.resource_id,
                    nonce: lock.nonce,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match self.read_lock(resource).await {
                    Ok(Some(existing)) => Ok(Attempt::Held(existing)),
                    // Released between our open and read.
                    Ok(None) => Ok(Attempt::Unreadable),
                    Err(RepositoryError::Serialization(_)) => Ok(Attempt::Unreadable),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stale lock only if it is still the one we judged stale.
    async fn break_stale(&self, resource: &str, stale: &ResourceLock) -> Result<(), RepositoryError> {
        let path = self.lock_path(resource);
        let parked = self
            .locks_dir
            .join(format!(".{}.{}.broken", resource, uuid::Uuid::new_v4().simple()));

        match fs::rename(&path, &parked).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let parked_lock: Option<ResourceLock> = fs::read_to_string(&parked)
            .await
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok());

        match parked_lock {
            // Someone re-took the lock after we read it; put theirs back.
            Some(current) if current.nonce != stale.nonce => {
                self.restore_parked(resource, &parked, &current).await
            }
            _ => {
                info!(resource, old_holder = %stale.held_by, "Removing stale lock");
                let _ = fs::remove_file(&parked).await;
                Ok(())
            }
        }
    }

    /// Link a live lock moved aside by [`Self::break_stale`] back into place.
    /// If another process created the lock file meanwhile, the resource now
    /// has two believed holders; report contention instead of carrying on.
    async fn restore_parked(
        &self,
        resource: &str,
        parked: &Path,
        current: &ResourceLock,
    ) -> Result<(), RepositoryError> {
        let restored = fs::hard_link(parked, self.lock_path(resource)).await;
        let _ = fs::remove_file(parked).await;
        match restored {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(resource, holder = %current.held_by, error = %e, "Could not restore lock taken during stale break");
                Err(RepositoryError::LockContention {
                    resource: resource.to_string(),
                    holder: current.held_by.clone(),
                })
            }
        }
    }

    async fn unreadable_is_stale(&self, resource: &str) -> bool {
        fs::metadata(self.lock_path(resource))
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= self.policy.stale_after)
    }
}

#[async_trait]
impl LockManager for FileLockManager {
    async fn acquire(&self, resource: &str) -> Result<LockToken, RepositoryError> {
        fs::create_dir_all(&self.locks_dir).await?;

        let attempts = self.policy.retry_attempts.max(1);
        let mut last_holder = String::from("unknown");

        for attempt in 0..attempts {
            match self.try_acquire(resource).await? {
                Attempt::Acquired(token) => return Ok(token),
                Attempt::Held(existing) if self.is_stale(&existing) => {
                    self.break_stale(resource, &existing).await?;
                    last_holder = existing.held_by;
                    continue;
                }
                Attempt::Held(existing) => {
                    last_holder = existing.held_by;
                }
                Attempt::Unreadable => {
                    if self.unreadable_is_stale(resource).await {
                        warn!(resource, "Removing unreadable stale lock");
                        let _ = fs::remove_file(self.lock_path(resource)).await;
                        continue;
                    }
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(self.policy.retry_delay * (attempt + 1)).await;
            }
        }

        Err(RepositoryError::LockContention {
            resource: resource.to_string(),
            holder: last_holder,
        })
    }

    async fn release(&self, token: LockToken) -> Result<(), RepositoryError> {
        match self.read_lock(&token.resource_id).await {
            Ok(Some(current)) if current.nonce == token.nonce => {
                fs::remove_file(self.lock_path(&token.resource_id)).await?;
                debug!(resource = %token.resource_id, "Lock released");
                Ok(())
            }
            Ok(Some(current)) => {
                warn!(
                    resource = %token.resource_id,
                    holder = %current.held_by,
                    "Lock was broken and re-acquired by another holder; leaving it"
                );
                Ok(())
            }
            Ok(None) => {
                warn!(resource = %token.resource_id, "Lock already gone at release");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Process-local lock manager for in-memory wiring and tests.
#[derive(Clone, Default)]
pub struct InMemoryLockManager {
    held: Arc<Mutex<HashMap<String, String>>>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self {
            held: Arc::new(Mutex::new(HashMap::new())),
            retry_attempts: 1,
            retry_delay: Duration::from_millis(10),
        }
    }

    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    pub fn is_held(&self, resource: &str) -> bool {
        self.held.lock().contains_key(resource)
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, resource: &str) -> Result<LockToken, RepositoryError> {
        let attempts = self.retry_attempts.max(1);
        for attempt in 0..attempts {
            {
                let mut held = self.held.lock();
                if !held.contains_key(resource) {
                    let nonce = uuid::Uuid::new_v4().to_string();
                    held.insert(resource.to_string(), nonce.clone());
                    return Ok(LockToken {
                        resource_id: resource.to_string(),
                        nonce,
                    });
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(RepositoryError::LockContention {
            resource: resource.to_string(),
            holder: current_holder(),
        })
    }

    async fn release(&self, token: LockToken) -> Result<(), RepositoryError> {
        let mut held = self.held.lock();
        if held.get(&token.resource_id) == Some(&token.nonce) {
            held.remove(&token.resource_id);
        }
        Ok(())
    }
}

/// Lock files left by crashed processes, for status reporting.
pub async fn list_lock_files(locks_dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(mut entries) = fs::read_dir(locks_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "lock") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}
