// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Task commands
//!
//! Commands: list, create, assign, show

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use acp_core::application::task::NewTask;
use acp_core::domain::task::{Task, TaskId, TaskPriority, TaskStatus};

use crate::context::CoordinationContext;

#[derive(Subcommand)]
pub enum TaskCommand {
    /// List tasks
    List {
        /// Only show tasks with this status (e.g. todo, in-progress)
        #[arg(long)]
        status: Option<String>,

        /// Only show tasks assigned to this agent
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Create a task
    Create {
        /// Task title
        #[arg(value_name = "TITLE")]
        title: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Priority (critical, high, normal, low)
        #[arg(short, long, default_value = "normal")]
        priority: String,

        /// Assign to this agent and notify its inbox
        #[arg(long, value_name = "AGENT_ID")]
        assign: Option<String>,

        /// Who is filing the task
        #[arg(long, env = "ACP_USER", default_value = "cli-user")]
        reporter: String,
    },

    /// Assign a task to an agent and notify its inbox
    Assign {
        /// Task ID
        #[arg(value_name = "TASK_ID")]
        task_id: String,

        /// Agent ID
        #[arg(value_name = "AGENT_ID")]
        agent_id: String,

        /// Sender recorded on the assignment message
        #[arg(long, env = "ACP_USER", default_value = "cli-user")]
        from: String,
    },

    /// Show a task (JSON)
    Show {
        /// Task ID
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },
}

pub async fn handle_command(command: TaskCommand, ctx: &CoordinationContext) -> Result<()> {
    match command {
        TaskCommand::List { status, assignee } => {
            let status = status
                .map(|s| s.parse::<TaskStatus>().map_err(anyhow::Error::msg))
                .transpose()?;
            list_tasks(status, assignee, ctx).await
        }
        TaskCommand::Create {
            title,
            description,
            priority,
            assign,
            reporter,
        } => {
            let priority = priority
                .parse::<TaskPriority>()
                .map_err(anyhow::Error::msg)?;
            let new_task = NewTask {
                title,
                description,
                priority,
                assignee: assign,
                reporter: reporter.clone(),
            };
            create_task(new_task, &reporter, ctx).await
        }
        TaskCommand::Assign {
            task_id,
            agent_id,
            from,
        } => assign_task(TaskId::new(task_id), &agent_id, &from, ctx).await,
        TaskCommand::Show { task_id } => show_task(TaskId::new(task_id), ctx).await,
    }
}

async fn list_tasks(
    status: Option<TaskStatus>,
    assignee: Option<String>,
    ctx: &CoordinationContext,
) -> Result<()> {
    let tasks: Vec<Task> = ctx
        .task_service()
        .list()
        .await?
        .into_iter()
        .filter(|t| status.is_none_or(|s| t.status == s))
        .filter(|t| assignee.is_none() || t.assignee == assignee)
        .collect();

    if tasks.is_empty() {
        println!("{}", "No tasks found".yellow());
        return Ok(());
    }

    println!("{} tasks found:", tasks.len());
    println!(
        "{:<14} {:<12} {:<9} {:<20} {}",
        "ID", "STATUS", "PRIORITY", "ASSIGNEE", "TITLE"
    );
    for task in tasks {
        println!(
            "{:<14} {:<12} {:<9} {:<20} {}",
            task.id.as_str().bold(),
            task.status.to_string(),
            task.priority.to_string(),
            task.assignee.as_deref().unwrap_or("-"),
            task.title
        );
    }

    Ok(())
}

async fn create_task(new_task: NewTask, reporter: &str, ctx: &CoordinationContext) -> Result<()> {
    let task = ctx
        .task_service()
        .create(new_task)
        .await
        .context("Failed to create task")?;

    println!("{}", format!("✓ Task created: {}", task.id).green());
    notify(&task, reporter, ctx).await
}

async fn assign_task(
    task_id: TaskId,
    agent_id: &str,
    from: &str,
    ctx: &CoordinationContext,
) -> Result<()> {
    let task = ctx
        .task_service()
        .assign(&task_id, agent_id)
        .await
        .with_context(|| format!("Failed to assign task {}", task_id))?;

    println!(
        "{}",
        format!("✓ Task {} assigned to {}", task.id, agent_id).green()
    );
    notify(&task, from, ctx).await
}

async fn notify(task: &Task, from: &str, ctx: &CoordinationContext) -> Result<()> {
    if let Some(path) = ctx.notify_assignment(task, from).await? {
        println!(
            "{}",
            format!("  TASK_ASSIGN queued at {}", path.display()).dimmed()
        );
    }
    Ok(())
}

async fn show_task(task_id: TaskId, ctx: &CoordinationContext) -> Result<()> {
    let task = ctx.task_service().get(&task_id).await?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}
