// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Slot management commands
//!
//! Commands: list, create, show, delete

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use acp_core::application::slot_claim::SlotClaimService;
use acp_core::domain::agent::AgentProvider;
use acp_core::domain::slot::{Slot, SlotId, SlotStatus};

use crate::context::CoordinationContext;

#[derive(Subcommand)]
pub enum SlotCommand {
    /// List all slots
    List,

    /// Create a new slot
    Create {
        /// Slot ID
        #[arg(value_name = "SLOT_ID")]
        slot_id: String,

        /// Role agents in this slot take on (e.g. backend-developer)
        #[arg(long)]
        role: String,

        /// Display name (default: the slot ID)
        #[arg(long)]
        name: Option<String>,

        /// Approved providers (repeatable or comma separated)
        #[arg(long = "provider", value_delimiter = ',', required = true)]
        providers: Vec<String>,

        /// Approved models (repeatable or comma separated)
        #[arg(long = "model", value_delimiter = ',', required = true)]
        models: Vec<String>,

        /// Maximum number of concurrent claims
        #[arg(long, default_value = "1")]
        max_concurrent: u32,

        /// Mark the slot as approved by this operator
        #[arg(long, value_name = "APPROVER")]
        approve: Option<String>,
    },

    /// Show a slot (YAML)
    Show {
        /// Slot ID
        #[arg(value_name = "SLOT_ID")]
        slot_id: String,
    },

    /// Delete a slot
    Delete {
        /// Slot ID
        #[arg(value_name = "SLOT_ID")]
        slot_id: String,

        /// Delete even if the slot has active claims
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: SlotCommand, ctx: &CoordinationContext) -> Result<()> {
    match command {
        SlotCommand::List => list_slots(ctx).await,
        SlotCommand::Create {
            slot_id,
            role,
            name,
            providers,
            models,
            max_concurrent,
            approve,
        } => {
            let providers = providers
                .iter()
                .map(|p| p.parse::<AgentProvider>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?;

            let mut slot = Slot::new(SlotId::new(slot_id), role, providers, models, max_concurrent);
            if let Some(name) = name {
                slot.name = name;
            }
            if let Some(approver) = approve {
                slot.approve(approver, Utc::now());
            }
            create_slot(slot, ctx).await
        }
        SlotCommand::Show { slot_id } => show_slot(SlotId::new(slot_id), ctx).await,
        SlotCommand::Delete { slot_id, force } => {
            delete_slot(SlotId::new(slot_id), force, ctx).await
        }
    }
}

async fn list_slots(ctx: &CoordinationContext) -> Result<()> {
    let slots = ctx.claim_service().list_slots().await?;

    if slots.is_empty() {
        println!("{}", "No slots found".yellow());
        return Ok(());
    }

    println!("{} slots found:", slots.len());
    println!(
        "{:<24} {:<22} {:<10} {:<8} {}",
        "ID", "ROLE", "STATUS", "CLAIMS", "PROVIDERS"
    );

    for slot in slots {
        let providers = slot
            .approved_providers
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<24} {:<22} {:<10} {:<8} {}",
            slot.id.as_str().bold(),
            slot.role,
            colorize_status(slot.status),
            format!("{}/{}", slot.current_claims.len(), slot.max_concurrent),
            providers
        );
    }

    Ok(())
}

async fn create_slot(slot: Slot, ctx: &CoordinationContext) -> Result<()> {
    let slot = ctx
        .claim_service()
        .create_slot(slot)
        .await
        .context("Failed to create slot")?;

    println!("{}", format!("✓ Slot created: {}", slot.id).green());
    if !slot.approved {
        println!(
            "{}",
            "  Not yet approved by an operator (use --approve <name>)".dimmed()
        );
    }
    Ok(())
}

async fn show_slot(slot_id: SlotId, ctx: &CoordinationContext) -> Result<()> {
    let slot = ctx.claim_service().get_slot(&slot_id).await?;
    let yaml = serde_yaml::to_string(&slot).context("Failed to render slot")?;
    println!("{}", yaml);
    Ok(())
}

async fn delete_slot(slot_id: SlotId, force: bool, ctx: &CoordinationContext) -> Result<()> {
    ctx.claim_service().delete_slot(&slot_id, force).await?;
    println!("{}", format!("✓ Slot {} deleted", slot_id).green());
    Ok(())
}

fn colorize_status(status: SlotStatus) -> colored::ColoredString {
    let label = format!("{:<10}", status.to_string());
    match status {
        SlotStatus::Available => label.green(),
        SlotStatus::Claimed => label.cyan(),
        SlotStatus::Suspended => label.yellow(),
        SlotStatus::Expired => label.red(),
    }
}
