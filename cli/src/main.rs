// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # ACP Operator CLI
//!
//! The `acp` binary manages a project's coordination root: slots, agents,
//! tasks and mailboxes. Agents themselves use `acp-agent`.
//!
//! ## Commands
//!
//! - `acp init` - Scaffold `.acp/` in the project
//! - `acp slot list|create|show|delete` - Slot management
//! - `acp agent list|show` - Registered agents
//! - `acp task list|create|assign|show` - Task board
//! - `acp message send` - Enqueue a message into an agent inbox
//! - `acp status` - Summary
//! - `acp config show|validate|generate` - Configuration management

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use acp_orchestrator::commands::{
    self, AgentCommand, ConfigCommand, MessageCommand, SlotCommand, TaskCommand,
};
use acp_orchestrator::context::CoordinationContext;
use acp_orchestrator::init_logging;

/// ACP - coordinate autonomous agents through a shared project directory
#[derive(Parser)]
#[command(name = "acp")]
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
    #[arg(long, global = true, env = "ACP_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the coordination root in the project
    #[command(name = "init")]
    Init,

    /// Slot management
    #[command(name = "slot")]
    Slot {
        #[command(subcommand)]
        command: SlotCommand,
    },

    /// Agent records
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Task board
    #[command(name = "task")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Agent messaging
    #[command(name = "message")]
    Message {
        #[command(subcommand)]
        command: MessageCommand,
    },

    /// Summary of slots, agents, tasks and inboxes
    #[command(name = "status")]
    Status,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let Some(command) = cli.command else {
        eprintln!("{}", "No command specified. Use --help for usage.".yellow());
        std::process::exit(1);
    };

    let (project, config) = (cli.project, cli.config);
    match command {
        Commands::Init => commands::init::execute(&open(project, config).await?).await,
        Commands::Slot { command } => {
            commands::slot::handle_command(command, &open(project, config).await?).await
        }
        Commands::Agent { command } => {
            commands::agent::handle_command(command, &open(project, config).await?).await
        }
        Commands::Task { command } => {
            commands::task::handle_command(command, &open(project, config).await?).await
        }
        Commands::Message { command } => {
            commands::message::handle_command(command, &open(project, config).await?).await
        }
        Commands::Status => commands::status::execute(&open(project, config).await?).await,
        Commands::Config { command } => {
            let project_root = match project {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            commands::config::handle_command(command, &project_root, config).await
        }
    }
}

async fn open(project: Option<PathBuf>, config: Option<PathBuf>) -> Result<CoordinationContext> {
    let ctx = CoordinationContext::load(project, config.as_deref())?;
    ctx.recover().await;
    Ok(ctx)
}
