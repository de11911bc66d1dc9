// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::lock::{task_resource, LockManager};
use crate::domain::repository::{ProjectRepository, RepositoryError, TaskRepository};
use crate::domain::task::{Task, TaskId, TaskPriority};

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub assignee: Option<String>,
    pub reporter: String,
}

/// Task bookkeeping for the operator CLI and the worker's TASK_ASSIGN handler.
#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    projects: Arc<dyn ProjectRepository>,
    locks: Arc<dyn LockManager>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        projects: Arc<dyn ProjectRepository>,
        locks: Arc<dyn LockManager>,
    ) -> Self {
        Self {
            tasks,
            projects,
            locks,
        }
    }

    /// Generated ids that collide with an existing task gain a numeric suffix.
    /// Save `task` under the first free id of `TASK-XXXX`, `TASK-XXXX-2`, ...
    /// Each candidate is checked and written while holding its task lock, so
    /// concurrent creators never share an id.
    async fn insert_with_free_id(&self, mut task: Task) -> Result<Task> {
        let base = task.id.clone();
        let mut suffix = 1u32;
        loop {
            task.id = if suffix == 1 {
                base.clone()
            } else {
                TaskId::new(format!("{}-{}", base, suffix))
            };

            let token = self.locks.acquire(&task_resource(&task.id)).await?;
            let result: Result<bool> = async {
                if self.tasks.find_by_id(&task.id).await?.is_some() {
                    return Ok(false);
                }
                self.tasks
                    .save(&task)
                    .await
                    .with_context(|| format!("Failed to save task {}", task.id))?;
                Ok(true)
            }
            .await;
            if let Err(e) = self.locks.release(token).await {
                warn!(task_id = %task.id, error = %e, "Failed to release task lock");
            }

            if result? {
                return Ok(task);
            }
            suffix += 1;
        }
    }

    pub async fn create(&self, new_task: NewTask) -> Result<Task> {
        let project = self.projects.load().await?;
        let now = Utc::now();

        let mut task = Task::new(TaskId::generate(now), new_task.title, project.id, new_task.reporter, now);
        task.description = new_task.description;
        task.priority = new_task.priority;
        task.sprint = project.current_sprint.map(|s| s.id);
        if let Some(assignee) = new_task.assignee {
            task.assign(assignee);
        }

        let task = self.insert_with_free_id(task).await?;
        info!(task_id = %task.id, status = %task.status, "Task created");
        Ok(task)
    }

    pub async fn assign(&self, id: &TaskId, assignee: &str) -> Result<Task> {
        self.update(id, |task| {
            task.assign(assignee);
            true
        })
        .await
    }

    /// Mark an assigned task as started. Returns `false` when it already was,
    /// which makes redelivered assignments harmless.
    pub async fn start(&self, id: &TaskId) -> Result<bool> {
        let mut changed = false;
        self.update(id, |task| {
            changed = task.start(Utc::now());
            changed
        })
        .await?;
        Ok(changed)
    }

    pub async fn get(&self, id: &TaskId) -> Result<Task> {
        self.tasks
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("task {}", id)).into())
    }

    pub async fn list(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.list_all().await?)
    }

    async fn update<F>(&self, id: &TaskId, mutate: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> bool + Send,
    {
        let token = self.locks.acquire(&task_resource(id)).await?;
        let result: Result<Task> = async {
            let mut task = self.get(id).await?;
            if mutate(&mut task) {
                self.tasks.save(&task).await?;
                debug!(task_id = %id, status = %task.status, "Task updated");
            }
            Ok(task)
        }
        .await;

        if let Err(e) = self.locks.release(token).await {
            warn!(task_id = %id, error = %e, "Failed to release task lock");
        }
        result
    }
}
