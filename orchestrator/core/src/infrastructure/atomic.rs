// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Atomic file persistence.
//!
//! Every record under the coordination root is written to a hidden temp file
//! in the target directory, synced, then renamed over the destination. Readers
//! therefore see either the old or the new content, never a torn write.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::{debug, warn};

const TMP_SUFFIX: &str = "tmp";

/// Temp files younger than this may belong to a writer that is still running.
pub const INTERRUPTED_WRITE_GRACE: Duration = Duration::from_secs(60);

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let unique = uuid::Uuid::new_v4().simple().to_string();
    path.with_file_name(format!(
        ".{}.{}.{}.{}",
        file_name,
        std::process::id(),
        &unique[..8],
        TMP_SUFFIX
    ))
}

pub async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, content).await?;

    if let Err(e) = commit(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    debug!(path = %path.display(), "Atomic write completed");
    Ok(())
}

/// Sync `tmp_path` and rename it over `path`. Unsynced data is never renamed.
async fn commit(tmp_path: &Path, path: &Path) -> std::io::Result<()> {
    let tmp_for_sync = tmp_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        std::fs::File::open(&tmp_for_sync).and_then(|file| file.sync_all())
    })
    .await
    .map_err(std::io::Error::other)?
    .inspect_err(|e| warn!(error = %e, path = %tmp_path.display(), "Failed to sync temp file to disk"))?;

    fs::rename(tmp_path, path).await
}

/// Remove temp files abandoned by writers that died before renaming.
///
/// Files younger than `grace` are left alone. Returns how many were removed.
pub async fn recover_interrupted_writes(dir: &Path, grace: Duration) -> usize {
    let mut removed = 0;
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return removed;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_tmp = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|n| n.starts_with('.') && n.ends_with(&format!(".{}", TMP_SUFFIX)));
        if !is_tmp {
            continue;
        }

        let age = entry
            .metadata()
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or_default();
        if age < grace {
            continue;
        }

        debug!(path = %path.display(), "Removing interrupted write");
        if fs::remove_file(&path).await.is_ok() {
            removed += 1;
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_content_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("record.json");

        write_atomic(&target, b"first").await.unwrap();
        write_atomic(&target, b"second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_commit_fails_without_synced_temp_and_keeps_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("record.json");
        std::fs::write(&target, b"old").unwrap();

        let err = commit(&dir.path().join(".record.json.1.deadbeef.tmp"), &target)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_recover_respects_grace_period() {
        let dir = TempDir::new().unwrap();
        let stray = dir.path().join(".slot.yaml.123.abcd1234.tmp");
        std::fs::write(&stray, b"partial").unwrap();
        std::fs::write(dir.path().join("slot.yaml"), b"kept").unwrap();

        assert_eq!(recover_interrupted_writes(dir.path(), Duration::from_secs(3600)).await, 0);
        assert!(stray.exists());

        assert_eq!(recover_interrupted_writes(dir.path(), Duration::ZERO).await, 1);
        assert!(!stray.exists());
        assert!(dir.path().join("slot.yaml").exists());
    }

    #[tokio::test]
    async fn test_recover_on_missing_dir_is_noop() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            recover_interrupted_writes(&dir.path().join("absent"), Duration::ZERO).await,
            0
        );
    }
}
