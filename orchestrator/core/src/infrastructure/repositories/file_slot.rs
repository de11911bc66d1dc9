// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! YAML slot store: one `slots/<id>.yaml` per slot, wrapped as `{ slot: Slot }`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::repository::{RepositoryError, SlotRepository};
use crate::domain::slot::{Slot, SlotId};
use crate::infrastructure::atomic::{recover_interrupted_writes, write_atomic, INTERRUPTED_WRITE_GRACE};
use crate::infrastructure::layout::CoordinationLayout;
use crate::infrastructure::repositories::{ensure_initialized, list_record_files, read_optional};

#[derive(Debug, Serialize, Deserialize)]
struct SlotDocument {
    slot: Slot,
}

pub struct FileSlotRepository {
    layout: CoordinationLayout,
}

impl FileSlotRepository {
    pub fn new(layout: CoordinationLayout) -> Self {
        Self { layout }
    }

    /// Clean temp files left by interrupted saves.
    pub async fn recover(&self) -> usize {
        recover_interrupted_writes(&self.layout.slots_dir(), INTERRUPTED_WRITE_GRACE).await
    }

    fn parse(content: &str) -> Result<Slot, RepositoryError> {
        let doc: SlotDocument = serde_yaml::from_str(content)?;
        Ok(doc.slot)
    }

    /// Raw file contents, for callers that need to compare bytes on disk.
    pub async fn read_raw(&self, id: &SlotId) -> Result<Option<String>, RepositoryError> {
        read_optional(&self.layout.slot_file(id)).await
    }
}

#[async_trait]
impl SlotRepository for FileSlotRepository {
    async fn save(&self, slot: &mut Slot) -> Result<(), RepositoryError> {
        ensure_initialized(&self.layout).await?;
        let path = self.layout.slot_file(&slot.id);

        let stored = match read_optional(&path).await? {
            Some(content) => Self::parse(&content)?.revision,
            None => 0,
        };
        if stored != slot.revision {
            return Err(RepositoryError::Conflict {
                entity: format!("slot {}", slot.id),
                expected: slot.revision,
                found: stored,
            });
        }

        let mut next = slot.clone();
        next.revision += 1;
        let yaml = serde_yaml::to_string(&SlotDocument { slot: next })?;
        write_atomic(&path, yaml.as_bytes()).await?;

        slot.revision += 1;
        debug!(slot_id = %slot.id, revision = slot.revision, "Slot saved");
        Ok(())
    }

    async fn find_by_id(&self, id: &SlotId) -> Result<Option<Slot>, RepositoryError> {
        ensure_initialized(&self.layout).await?;
        match read_optional(&self.layout.slot_file(id)).await? {
            Some(content) => Ok(Some(Self::parse(&content)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Slot>, RepositoryError> {
        ensure_initialized(&self.layout).await?;
        let mut slots = Vec::new();
        for path in list_record_files(&self.layout.slots_dir(), "yaml").await? {
            let Some(content) = read_optional(&path).await? else {
                continue;
            };
            match Self::parse(&content) {
                Ok(slot) => slots.push(slot),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable slot file"),
            }
        }
        slots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(slots)
    }

    async fn delete(&self, id: &SlotId) -> Result<(), RepositoryError> {
        ensure_initialized(&self.layout).await?;
        match tokio::fs::remove_file(self.layout.slot_file(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepositoryError::NotFound(format!("slot {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
