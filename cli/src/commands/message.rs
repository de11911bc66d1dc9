// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use acp_core::domain::repository::ProjectRepository;
use acp_core::domain::task::TaskPriority;
use acp_swarm::domain::message::{Message, MessageType};

use crate::context::CoordinationContext;

#[derive(Subcommand)]
pub enum MessageCommand {
    /// Enqueue a message into an agent's inbox
    Send {
        /// Recipient agent ID
        #[arg(value_name = "AGENT_ID")]
        to: String,

        /// Message type (e.g. SYNC, QUERY, TASK_ASSIGN)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        message_type: String,

        /// Sender
        #[arg(long, env = "ACP_USER", default_value = "cli-user")]
        from: String,

        /// Related task ID
        #[arg(long)]
        task: Option<String>,

        /// Priority (critical, high, normal, low)
        #[arg(short, long, default_value = "normal")]
        priority: String,

        /// Payload (JSON string or @file.json)
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,

        /// Ask the recipient to acknowledge
        #[arg(long)]
        requires_ack: bool,
    },
}

pub async fn handle_command(command: MessageCommand, ctx: &CoordinationContext) -> Result<()> {
    match command {
        MessageCommand::Send {
            to,
            message_type,
            from,
            task,
            priority,
            payload,
            requires_ack,
        } => {
            let message_type = message_type
                .parse::<MessageType>()
                .map_err(anyhow::Error::msg)?;
            let priority = priority
                .parse::<TaskPriority>()
                .map_err(anyhow::Error::msg)?;
            let project = ctx.projects.load().await?;

            let mut message = Message::new(from, to, message_type, project.id)
                .with_priority(priority);
            if let Some(task) = task {
                message = message.with_task(task);
            }
            if let Some(payload) = payload {
                message = message.with_payload(parse_payload(&payload)?);
            }
            message.requires_ack = requires_ack;

            let path = ctx.send(&message).await?;
            println!(
                "{}",
                format!("✓ {} sent to {} ({})", message.message_type, message.to, message.id).green()
            );
            println!("{}", format!("  {}", path.display()).dimmed());
            Ok(())
        }
    }
}

/// Inline JSON, or `@path` to read it from a file.
fn parse_payload(raw: &str) -> Result<serde_json::Value> {
    let content = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file: {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&content).context("Payload is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_inline_and_file() {
        let inline = parse_payload(r#"{"topic":"standup"}"#).unwrap();
        assert_eq!(inline["topic"], "standup");

        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("payload.json");
        std::fs::write(&file, r#"[1, 2, 3]"#).unwrap();
        let from_file = parse_payload(&format!("@{}", file.display())).unwrap();
        assert_eq!(from_file, serde_json::json!([1, 2, 3]));

        assert!(parse_payload("not json").is_err());
    }
}
