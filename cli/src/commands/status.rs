// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `acp status`: one-screen summary of slots, agents, tasks and inboxes.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use acp_core::application::slot_claim::SlotClaimService;
use acp_core::domain::repository::{AgentRepository, ProjectRepository};
use acp_core::domain::slot::SlotStatus;
use acp_core::infrastructure::lock::list_lock_files;
use acp_swarm::infrastructure::mailbox::Mailbox;

use crate::commands::agent::liveness;
use crate::context::CoordinationContext;

pub async fn execute(ctx: &CoordinationContext) -> Result<()> {
    let project = ctx.projects.load().await?;
    let slots = ctx.claim_service().list_slots().await?;
    let agents = ctx.agents.list_all().await?;
    let tasks = ctx.task_service().list().await?;

    println!("{} {}", "Project:".bold(), project.name);
    println!("  Root: {}", ctx.layout.root().display());
    if let Some(sprint) = &project.current_sprint {
        println!("  Sprint: {} ({})", sprint.name, sprint.id);
    }
    println!();

    let claimed = slots
        .iter()
        .filter(|s| s.status == SlotStatus::Claimed)
        .count();
    let active_claims: usize = slots.iter().map(|s| s.current_claims.len()).sum();
    let capacity: u64 = slots.iter().map(|s| u64::from(s.max_concurrent)).sum();
    println!("{}", "Slots:".bold());
    println!(
        "  {} total, {} claimed, {}/{} claims in use",
        slots.len(),
        claimed,
        active_claims,
        capacity
    );
    println!();

    let window = chrono::Duration::from_std(ctx.config.spec.worker.liveness_window)
        .unwrap_or(chrono::Duration::MAX);
    let now = Utc::now();
    let live = agents.iter().filter(|a| a.is_live(now, window)).count();
    println!("{}", "Agents:".bold());
    println!("  {} registered, {} live", agents.len(), live);
    for agent in &agents {
        println!(
            "  {:<24} {:<20} {}",
            agent.id.as_str(),
            agent.slot_id.as_str(),
            liveness(agent, ctx)
        );
    }
    println!();

    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    for task in &tasks {
        *by_status.entry(task.status.to_string()).or_default() += 1;
    }
    println!("{}", "Tasks:".bold());
    if by_status.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for (status, count) in by_status {
        println!("  {:<12} {}", status, count);
    }
    println!();

    println!("{}", "Inboxes:".bold());
    let mut any_pending = false;
    for agent in &agents {
        let inbox = project.config.inbox_path.join(agent.id.as_str());
        let pending = match ctx.mailbox.poll(&inbox).await {
            Ok(batch) => batch.deliveries.len(),
            Err(_) => 0,
        };
        if pending > 0 {
            any_pending = true;
            println!("  {:<24} {} pending", agent.id.as_str(), pending);
        }
    }
    if !any_pending {
        println!("  {}", "no pending messages".dimmed());
    }

    let lock_files = list_lock_files(&ctx.layout.locks_dir()).await;
    if !lock_files.is_empty() {
        println!();
        println!("{}", "Held locks:".bold());
        for path in lock_files {
            let resource = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match ctx.locks.read_lock(&resource).await {
                Ok(Some(lock)) => println!(
                    "  {:<32} {} since {}",
                    resource,
                    lock.held_by,
                    lock.acquired_at.format("%Y-%m-%d %H:%M:%S")
                ),
                _ => println!("  {:<32} {}", resource, "(unreadable)".dimmed()),
            }
        }
    }

    Ok(())
}
