// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use acp_core::domain::agent::{Agent, AgentId};
use acp_core::domain::repository::AgentRepository;

use crate::context::CoordinationContext;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// List registered agents
    List,

    /// Show an agent record and its role manifest (JSON)
    Show {
        /// Agent ID
        #[arg(value_name = "AGENT_ID")]
        agent_id: String,
    },
}

pub async fn handle_command(command: AgentCommand, ctx: &CoordinationContext) -> Result<()> {
    match command {
        AgentCommand::List => list_agents(ctx).await,
        AgentCommand::Show { agent_id } => show_agent(AgentId::new(agent_id), ctx).await,
    }
}

async fn list_agents(ctx: &CoordinationContext) -> Result<()> {
    let agents = ctx.agents.list_all().await?;

    if agents.is_empty() {
        println!("{}", "No agents found".yellow());
        return Ok(());
    }

    println!("{} agents found:", agents.len());
    println!(
        "{:<24} {:<20} {:<10} {:<10} {:<20} {}",
        "ID", "SLOT", "PROVIDER", "STATUS", "MODEL", "LAST ACTIVE"
    );

    for agent in agents {
        println!(
            "{:<24} {:<20} {:<10} {:<10} {:<20} {}",
            agent.id.as_str().bold(),
            agent.slot_id,
            agent.provider.to_string(),
            agent.status.to_string(),
            agent.model,
            liveness(&agent, ctx)
        );
    }

    Ok(())
}

async fn show_agent(agent_id: AgentId, ctx: &CoordinationContext) -> Result<()> {
    let agent = ctx
        .agents
        .find_by_id(&agent_id)
        .await?
        .with_context(|| format!("Agent '{}' not found", agent_id))?;

    println!("{}", serde_json::to_string_pretty(&agent)?);

    match ctx.agents.find_manifest(&agent_id).await? {
        Some(manifest) => {
            println!();
            println!(
                "{} {}",
                "Manifest:".bold(),
                ctx.layout.manifest_file(&agent_id).display()
            );
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        None => println!("{}", "No role manifest on record".dimmed()),
    }

    Ok(())
}

/// `last_active` rendered relative to now, flagged when outside the liveness window.
pub(crate) fn liveness(agent: &Agent, ctx: &CoordinationContext) -> String {
    let now = Utc::now();
    let ago = (now - agent.last_active).num_seconds().max(0);
    let label = format!("{}s ago", ago);
    let window = chrono::Duration::from_std(ctx.config.spec.worker.liveness_window)
        .unwrap_or(chrono::Duration::MAX);

    if agent.is_live(now, window) {
        label.green().to_string()
    } else {
        label.dimmed().to_string()
    }
}
