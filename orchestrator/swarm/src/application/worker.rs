// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Worker Loop
//!
//! Long-running poll/dispatch/heartbeat loop that drives one agent's mailbox.
//!
//! # State Machine
//!
//! ```text
//! Starting → Polling → Dispatching → Polling → … → Stopping → Stopped
//! ```
//!
//! - **Starting:** ensure the inbox and `read/` exist; optionally hook
//!   SIGINT/SIGTERM to the stop flag.
//! - **Polling:** the only place the stop flag is observed.
//! - **Dispatching:** each message in timestamp order is handled, then
//!   acknowledged before the next one. A handler failure is logged, the
//!   message stays in the inbox and the batch continues; it is handled again
//!   next cycle. After `maxDeliveryAttempts` failed runs it is moved to
//!   `rejected/`. A failed ack also leaves the message for redelivery.
//! - After each cycle the agent heartbeat is updated (best effort), then the
//!   loop sleeps. Failing cycles back off exponentially with jitter up to
//!   `maxBackoff`; the first successful cycle resets to `pollInterval`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acp_core::application::presence::AgentPresence;
use acp_core::application::task::TaskService;
use acp_core::domain::agent::AgentId;
use acp_core::domain::coordination_config::WorkerConfig;
use acp_core::domain::manifest::RoleManifest;
use acp_core::domain::task::TaskId;
use async_trait::async_trait;
use rand::Rng;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::domain::message::{Message, MessageId, MessageType};
use crate::infrastructure::mailbox::{Mailbox, MailboxError, RejectedEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Polling,
    Dispatching,
    Stopping,
    Stopped,
}

/// Shared stop flag. Cloned into signal handlers and embedding code.
#[derive(Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, returning early if a stop is requested.
    pub async fn sleep(&self, duration: Duration) {
        let notified = self.wake.notified();
        if self.is_stop_requested() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }

    /// Flip the flag on SIGINT or SIGTERM.
    pub fn install_signal_handlers(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            handle.request_stop();
        });
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Must be safe to run twice for the same message: delivery is
    /// at-least-once.
    async fn handle(&self, message: &Message) -> anyhow::Result<()>;
}

/// Default dispatch table for agent workers.
pub struct StandardMessageHandler {
    agent_id: AgentId,
    tasks: Option<TaskService>,
}

impl StandardMessageHandler {
    pub fn new(agent_id: AgentId, tasks: Option<TaskService>) -> Self {
        Self { agent_id, tasks }
    }
}

#[async_trait]
impl MessageHandler for StandardMessageHandler {
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        match message.message_type {
            MessageType::TaskAssign => {
                let Some(task) = message.task.as_deref() else {
                    anyhow::bail!("TASK_ASSIGN message {} carries no task id", message.id);
                };
                info!(agent_id = %self.agent_id, task_id = task, "New task assigned");
                if let Some(tasks) = &self.tasks {
                    let started = tasks.start(&TaskId::new(task)).await?;
                    if !started {
                        debug!(task_id = task, "Task already started; assignment redelivered");
                    }
                }
                Ok(())
            }
            MessageType::Sync => {
                info!(agent_id = %self.agent_id, from = %message.from, "Sync request received");
                Ok(())
            }
            MessageType::Heartbeat => {
                debug!(agent_id = %self.agent_id, from = %message.from, "Heartbeat received");
                Ok(())
            }
            other => {
                info!(agent_id = %self.agent_id, message_type = %other, "No handler for message type");
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub max_backoff: Duration,
    /// Failed handler runs before a message is moved to `rejected/`.
    pub max_delivery_attempts: u32,
    pub handle_signals: bool,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_backoff: config.max_backoff,
            max_delivery_attempts: config.max_delivery_attempts,
            handle_signals: true,
        }
    }
}

/// Counts from a single poll/dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub processed: usize,
    pub handler_failures: usize,
    pub ack_failures: usize,
    /// Unparseable files and messages that exhausted their delivery attempts.
    pub rejected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub cycles: u64,
    pub messages_processed: u64,
    pub cycle_errors: u64,
}

/// Wait before the next cycle: the poll interval, or after `failures`
/// consecutive failing cycles `interval * 2^failures` plus up to 25% jitter,
/// capped at `max`.
pub fn backoff_delay(interval: Duration, max: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return interval;
    }
    let factor = 2u32.saturating_pow(failures.min(16));
    let base = interval.saturating_mul(factor).min(max);
    let jitter_cap = (base.as_millis() / 4) as u64;
    let jitter = if jitter_cap == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_cap)
    };
    (base + Duration::from_millis(jitter)).min(max)
}

pub struct WorkerLoop {
    agent_id: AgentId,
    inbox: PathBuf,
    mailbox: Arc<dyn Mailbox>,
    handler: Arc<dyn MessageHandler>,
    presence: Option<AgentPresence>,
    settings: WorkerSettings,
    stop: StopHandle,
    state: WorkerState,
    consecutive_failures: u32,
    /// Failed handler runs per message id still in the inbox.
    failed_attempts: HashMap<MessageId, u32>,
}

impl WorkerLoop {
    pub fn new(
        manifest: &RoleManifest,
        mailbox: Arc<dyn Mailbox>,
        handler: Arc<dyn MessageHandler>,
        presence: Option<AgentPresence>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            agent_id: AgentId::new(manifest.agent.id.clone()),
            inbox: manifest.communication.inbox.clone(),
            mailbox,
            handler,
            presence,
            settings,
            stop: StopHandle::new(),
            state: WorkerState::Starting,
            consecutive_failures: 0,
            failed_attempts: HashMap::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    /// Run until a stop is requested. Only a failure to prepare the inbox
    /// ends the loop with an error; per-cycle errors are logged and retried.
    pub async fn run(&mut self) -> Result<WorkerReport, MailboxError> {
        self.state = WorkerState::Starting;
        self.mailbox.ensure(&self.inbox).await?;
        if self.settings.handle_signals {
            self.stop.install_signal_handlers();
        }
        info!(agent_id = %self.agent_id, inbox = %self.inbox.display(), "Worker started");

        let mut report = WorkerReport::default();
        loop {
            self.state = WorkerState::Polling;
            if self.stop.is_stop_requested() {
                break;
            }

            report.cycles += 1;
            match self.run_cycle().await {
                Ok(outcome) => {
                    report.messages_processed += outcome.processed as u64;
                    self.consecutive_failures = 0;
                }
                Err(e) => {
                    report.cycle_errors += 1;
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                    metrics::counter!("acp_worker_cycle_errors_total").increment(1);
                    error!(agent_id = %self.agent_id, error = %e, "Worker cycle failed");
                }
            }

            let delay = backoff_delay(
                self.settings.poll_interval,
                self.settings.max_backoff,
                self.consecutive_failures,
            );
            self.stop.sleep(delay).await;
        }

        self.state = WorkerState::Stopping;
        info!(
            agent_id = %self.agent_id,
            cycles = report.cycles,
            messages = report.messages_processed,
            "Worker stopping"
        );
        self.state = WorkerState::Stopped;
        Ok(report)
    }

    /// One poll, dispatch and heartbeat pass.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, MailboxError> {
        let batch = self.mailbox.poll(&self.inbox).await?;
        let mut outcome = CycleOutcome::default();

        for entry in &batch.rejected {
            match self.mailbox.reject(&self.inbox, entry).await {
                Ok(()) => outcome.rejected += 1,
                Err(e) => warn!(path = %entry.path.display(), error = %e, "Failed to move rejected message"),
            }
        }

        if !batch.deliveries.is_empty() {
            self.state = WorkerState::Dispatching;
        }
        for delivery in &batch.deliveries {
            let message = &delivery.message;
            info!(
                agent_id = %self.agent_id,
                message_id = %message.id,
                message_type = %message.message_type,
                from = %message.from,
                "Received message"
            );
            metrics::counter!("acp_worker_messages_total", "type" => message.message_type.as_str())
                .increment(1);

            if let Err(e) = self.handler.handle(message).await {
                outcome.handler_failures += 1;
                let attempts = self.failed_attempts.entry(message.id.clone()).or_insert(0);
                *attempts += 1;
                let attempts = *attempts;
                if attempts < self.settings.max_delivery_attempts {
                    warn!(message_id = %message.id, attempts, error = %e, "Message handler failed; will retry");
                    continue;
                }

                let entry = RejectedEntry {
                    path: delivery.path.clone(),
                    reason: format!("handler failed {} times: {}", attempts, e),
                };
                match self.mailbox.reject(&self.inbox, &entry).await {
                    Ok(()) => {
                        outcome.rejected += 1;
                        self.failed_attempts.remove(&message.id);
                    }
                    Err(reject_err) => {
                        warn!(message_id = %message.id, error = %reject_err, "Failed to move undeliverable message")
                    }
                }
                continue;
            }

            match self.mailbox.ack(&self.inbox, delivery).await {
                Ok(()) => {
                    outcome.processed += 1;
                    self.failed_attempts.remove(&message.id);
                }
                Err(e) => {
                    outcome.ack_failures += 1;
                    warn!(message_id = %message.id, error = %e, "Ack failed; message will be redelivered");
                }
            }
        }
        self.state = WorkerState::Polling;

        self.heartbeat().await;
        Ok(outcome)
    }

    async fn heartbeat(&self) {
        let Some(presence) = &self.presence else {
            return;
        };
        if let Err(e) = presence.heartbeat(&self.agent_id).await {
            debug!(agent_id = %self.agent_id, error = %e, "Heartbeat skipped");
        }
    }
}
