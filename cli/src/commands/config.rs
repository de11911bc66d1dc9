// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use acp_core::domain::coordination_config::CoordinationConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./acp-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    project_root: &Path,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(project_root, config_override, paths).await,
        ConfigCommand::Validate { file } => {
            validate(project_root, file.or(config_override)).await
        }
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(project_root: &Path, config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = CoordinationConfig::load_or_default(config_override.as_deref(), project_root)
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. ACP_CONFIG_PATH: {}",
            std::env::var("ACP_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!(
            "  3. {}",
            project_root
                .join(&config.spec.coordination_dir)
                .join("config.yaml")
                .display()
        );
        println!("  4. ~/.acp/config.yaml");
        match CoordinationConfig::discover_config(project_root) {
            Some(path) if config_override.is_none() => {
                println!("  Using: {}", path.display())
            }
            None if config_override.is_none() => println!("  Using: {}", "built-in defaults".dimmed()),
            _ => {}
        }
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();
    println!("  Name: {}", config.metadata.name);
    println!("  Coordination dir: {}", config.spec.coordination_dir);
    println!();

    let worker = &config.spec.worker;
    println!("{}", "Worker:".bold());
    println!("  Poll interval: {}", humanize(worker.poll_interval));
    println!("  Max backoff: {}", humanize(worker.max_backoff));
    println!("  Liveness window: {}", humanize(worker.liveness_window));
    println!("  Max delivery attempts: {}", worker.max_delivery_attempts);
    println!();

    let locks = &config.spec.locks;
    println!("{}", "Locks:".bold());
    println!("  Stale after: {}", humanize(locks.stale_after));
    println!(
        "  Retries: {} x {}",
        locks.retry_attempts,
        humanize(locks.retry_delay)
    );
    println!();

    let constraints = &config.spec.constraints;
    println!("{}", "Manifest defaults:".bold());
    println!("  Max task duration: {}", constraints.max_task_duration);
    println!("  Requires review: {}", constraints.requires_review);
    println!("  Can deploy to: {}", constraints.can_deploy_to.join(", "));
    println!("  Reports to: {}", config.spec.role.reports_to);
    println!();

    Ok(())
}

async fn validate(project_root: &Path, config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CoordinationConfig::load_or_default(config_path.as_deref(), project_root)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    let sample = CoordinationConfig::default().to_yaml_string()?;

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn humanize(duration: std::time::Duration) -> String {
    humantime::format_duration(duration).to_string()
}
