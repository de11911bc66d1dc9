// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use tracing::warn;

use crate::domain::repository::{RepositoryError, TaskRepository};
use crate::domain::task::{Task, TaskId};
use crate::infrastructure::atomic::{recover_interrupted_writes, write_atomic, INTERRUPTED_WRITE_GRACE};
use crate::infrastructure::layout::CoordinationLayout;
use crate::infrastructure::repositories::{ensure_initialized, list_record_files, read_optional};

/// JSON task store: `tasks/<id>.json`.
pub struct FileTaskRepository {
    layout: CoordinationLayout,
}

impl FileTaskRepository {
    pub fn new(layout: CoordinationLayout) -> Self {
        Self { layout }
    }

    pub async fn recover(&self) -> usize {
        recover_interrupted_writes(&self.layout.tasks_dir(), INTERRUPTED_WRITE_GRACE).await
    }
}

#[async_trait]
impl TaskRepository for FileTaskRepository {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        ensure_initialized(&self.layout).await?;
        let json = serde_json::to_vec_pretty(task)?;
        write_atomic(&self.layout.task_file(&task.id), &json).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        ensure_initialized(&self.layout).await?;
        match read_optional(&self.layout.task_file(id)).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Task>, RepositoryError> {
        ensure_initialized(&self.layout).await?;
        let mut tasks = Vec::new();
        for path in list_record_files(&self.layout.tasks_dir(), "json").await? {
            let Some(content) = read_optional(&path).await? else {
                continue;
            };
            match serde_json::from_str::<Task>(&content) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable task file"),
            }
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }
}
