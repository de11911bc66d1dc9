// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent-side commands: claim a slot, release it, run the worker loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use acp_core::application::slot_claim::{ClaimRequest, SlotClaimService};
use acp_core::domain::agent::{AgentId, AgentProvider};
use acp_core::domain::manifest::RoleManifest;
use acp_core::domain::repository::{AgentRepository, SlotRepository};
use acp_core::domain::slot::SlotId;
use acp_swarm::application::worker::{StandardMessageHandler, WorkerLoop, WorkerSettings};

use crate::context::CoordinationContext;

pub async fn claim_slot(
    slot_id: String,
    provider: String,
    model: Option<String>,
    name: Option<String>,
    run_worker: bool,
    ctx: &CoordinationContext,
) -> Result<()> {
    let provider = provider
        .parse::<AgentProvider>()
        .map_err(anyhow::Error::msg)?;

    let outcome = ctx
        .claim_service()
        .claim(ClaimRequest {
            slot_id: SlotId::new(slot_id.clone()),
            provider,
            model,
            agent_name: name,
        })
        .await
        .with_context(|| format!("Failed to claim slot {}", slot_id))?;

    println!("{}", format!("✓ Claimed slot {}", slot_id).green());
    println!("  Agent:   {}", outcome.agent_id.as_str().bold());
    println!("  Session: {}", outcome.session_key);
    println!("  Role:    {}", outcome.role);
    println!("  Model:   {}", outcome.model);
    println!(
        "  Manifest: {}",
        ctx.layout.manifest_file(&outcome.agent_id).display()
    );

    if !run_worker {
        return Ok(());
    }
    println!();
    run(outcome.manifest, ctx).await
}

pub async fn release_slot(
    slot_id: String,
    session_key: Option<String>,
    ctx: &CoordinationContext,
) -> Result<()> {
    let released = ctx
        .claim_service()
        .release(&SlotId::new(slot_id.clone()), session_key.as_deref())
        .await
        .with_context(|| format!("Failed to release slot {}", slot_id))?;

    println!(
        "{}",
        format!("✓ Released slot {} (session {})", slot_id, released.session_key).green()
    );
    Ok(())
}

/// Resume the worker loop of an agent from its persisted manifest.
pub async fn resume_worker(agent_id: String, ctx: &CoordinationContext) -> Result<()> {
    let agent_id = AgentId::new(agent_id);
    let manifest = ctx
        .agents
        .find_manifest(&agent_id)
        .await?
        .with_context(|| format!("No role manifest for agent '{}'; claim a slot first", agent_id))?;

    let slot_id = SlotId::new(manifest.agent.slot_id.clone());
    let slot = ctx
        .slots
        .find_by_id(&slot_id)
        .await?
        .with_context(|| format!("Slot {} no longer exists", slot_id))?;
    if !slot
        .current_claims
        .iter()
        .any(|c| c.session_key == manifest.agent.session_key)
    {
        anyhow::bail!(
            "Session {} is no longer an active claim on slot {}",
            manifest.agent.session_key,
            slot_id
        );
    }

    run(manifest, ctx).await
}

async fn run(manifest: RoleManifest, ctx: &CoordinationContext) -> Result<()> {
    let agent_id = AgentId::new(manifest.agent.id.clone());
    let handler = Arc::new(StandardMessageHandler::new(
        agent_id.clone(),
        Some(ctx.task_service()),
    ));
    let mut worker = WorkerLoop::new(
        &manifest,
        ctx.mailbox.clone(),
        handler,
        Some(ctx.presence()),
        WorkerSettings::from(&ctx.config.spec.worker),
    );

    println!(
        "{}",
        format!(
            "Watching {} (Ctrl+C to stop)",
            worker.inbox().display()
        )
        .dimmed()
    );
    let report = worker.run().await.context("Worker failed to start")?;

    info!(
        agent_id = %agent_id,
        cycles = report.cycles,
        messages = report.messages_processed,
        cycle_errors = report.cycle_errors,
        "Worker stopped"
    );
    println!(
        "{}",
        format!(
            "✓ Worker stopped after {} cycles ({} messages)",
            report.cycles, report.messages_processed
        )
        .green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acp_core::domain::coordination_config::CoordinationConfig;
    use acp_core::domain::slot::Slot;
    use tempfile::TempDir;

    async fn project_with_slot() -> (TempDir, CoordinationContext) {
        let dir = TempDir::new().unwrap();
        let ctx = CoordinationContext::from_config(dir.path(), CoordinationConfig::default());
        ctx.projects.initialize().await.unwrap();
        ctx.claim_service()
            .create_slot(Slot::new(
                SlotId::new("s1"),
                "backend-developer",
                vec![AgentProvider::Openclaw],
                vec!["m1".to_string()],
                1,
            ))
            .await
            .unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_resume_refuses_released_session() {
        let (_dir, ctx) = project_with_slot().await;
        claim_slot(
            "s1".to_string(),
            "openclaw".to_string(),
            None,
            Some("agent-x".to_string()),
            false,
            &ctx,
        )
        .await
        .unwrap();
        release_slot("s1".to_string(), None, &ctx).await.unwrap();

        let err = resume_worker("agent-x".to_string(), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("no longer an active claim"));
    }

    #[tokio::test]
    async fn test_claim_rejects_unknown_provider() {
        let (_dir, ctx) = project_with_slot().await;
        let err = claim_slot("s1".to_string(), "gemini".to_string(), None, None, false, &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[tokio::test]
    async fn test_resume_without_manifest_fails() {
        let (_dir, ctx) = project_with_slot().await;
        assert!(resume_worker("ghost".to_string(), &ctx).await.is_err());
    }
}
