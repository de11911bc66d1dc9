// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `acp init`: scaffold the coordination root in a project.

use anyhow::{Context, Result};
use colored::Colorize;

use acp_core::domain::repository::RepositoryError;
use acp_core::infrastructure::atomic::write_atomic;
use acp_core::infrastructure::repositories::file_project::EXAMPLE_SLOT_ID;

use crate::context::CoordinationContext;

pub async fn execute(ctx: &CoordinationContext) -> Result<()> {
    let project = match ctx.projects.initialize().await {
        Ok(project) => project,
        Err(RepositoryError::AlreadyExists(path)) => {
            anyhow::bail!("Project already initialized ({})", path);
        }
        Err(e) => return Err(e).context("Failed to initialize project"),
    };

    let config_file = ctx.layout.config_file();
    if !config_file.exists() {
        let yaml = ctx.config.to_yaml_string()?;
        write_atomic(&config_file, yaml.as_bytes())
            .await
            .with_context(|| format!("Failed to write config to {:?}", config_file))?;
    }

    println!(
        "{}",
        format!("✓ Initialized project '{}' in {}", project.name, ctx.layout.root().display())
            .green()
    );
    println!();
    println!("{}", "Created:".bold());
    for dir in ctx.layout.scaffold_dirs() {
        println!("  {}", dir.display());
    }
    println!("  {}", ctx.layout.project_file().display());
    println!("  {}", config_file.display());
    println!();
    println!("{}", "Next steps:".bold());
    println!(
        "  1. Review the example slot: acp slot show {}",
        EXAMPLE_SLOT_ID
    );
    println!("  2. Create slots for your agents: acp slot create <id> --role <role> ...");
    println!("  3. Start an agent: acp-agent claim-slot <id> --provider <provider>");

    Ok(())
}
