// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # ACP Agent CLI
//!
//! The `acp-agent` binary is what an agent process runs: it claims a slot,
//! receives its role manifest and then drives its mailbox until stopped.
//!
//! - `acp-agent claim-slot <slot> --provider <p>` - Claim and start the worker
//! - `acp-agent release-slot <slot>` - Give the claim back
//! - `acp-agent worker <agent>` - Resume the worker from a stored manifest

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use acp_orchestrator::commands::session;
use acp_orchestrator::context::CoordinationContext;
use acp_orchestrator::init_logging;

/// ACP agent runtime - claim a slot and process the agent mailbox
#[derive(Parser)]
#[command(name = "acp-agent")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root (default: current directory)
    #[arg(short, long, global = true, env = "ACP_PROJECT", value_name = "DIR")]
    project: Option<PathBuf>,

    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ACP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ACP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Claim a slot and start processing the inbox
    #[command(name = "claim-slot")]
    ClaimSlot {
        /// Slot ID
        #[arg(value_name = "SLOT_ID")]
        slot_id: String,

        /// Provider running this agent (openclaw, claude, codex, openai, custom)
        #[arg(long)]
        provider: String,

        /// Model (default: the slot's first approved model)
        #[arg(long)]
        model: Option<String>,

        /// Agent name, used as the agent ID (default: the slot ID, suffixed
        /// -2, -3, ... while that ID holds an active claim)
        #[arg(long)]
        name: Option<String>,

        /// Claim only; do not start the worker loop
        #[arg(long)]
        no_worker: bool,
    },

    /// Release a claim on a slot
    #[command(name = "release-slot")]
    ReleaseSlot {
        /// Slot ID
        #[arg(value_name = "SLOT_ID")]
        slot_id: String,

        /// Session key of the claim (required when several are active)
        #[arg(long = "session", value_name = "SESSION_KEY")]
        session_key: Option<String>,
    },

    /// Resume the worker loop of an agent that already holds a claim
    #[command(name = "worker")]
    Worker {
        /// Agent ID
        #[arg(value_name = "AGENT_ID")]
        agent_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let ctx = CoordinationContext::load(cli.project, cli.config.as_deref())?;
    ctx.recover().await;

    match cli.command {
        Commands::ClaimSlot {
            slot_id,
            provider,
            model,
            name,
            no_worker,
        } => session::claim_slot(slot_id, provider, model, name, !no_worker, &ctx).await,
        Commands::ReleaseSlot {
            slot_id,
            session_key,
        } => session::release_slot(slot_id, session_key, &ctx).await,
        Commands::Worker { agent_id } => session::resume_worker(agent_id, &ctx).await,
    }
}
