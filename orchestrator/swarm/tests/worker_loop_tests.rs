// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the file mailbox and the worker loop.
//!
//! Worker tests write agent and task records straight through the core
//! stores instead of going through a slot claim.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use acp_core::application::presence::AgentPresence;
use acp_core::application::task::{NewTask, TaskService};
use acp_core::domain::agent::{Agent, AgentId, AgentProvider};
use acp_core::domain::coordination_config::LockConfig;
use acp_core::domain::manifest::{
    ManifestAgent, ManifestCommunication, ManifestConstraints, ManifestContext, ManifestRole,
    ManifestTeam, RoleManifest,
};
use acp_core::domain::repository::AgentRepository;
use acp_core::domain::slot::SlotId;
use acp_core::domain::task::TaskStatus;
use acp_core::infrastructure::layout::CoordinationLayout;
use acp_core::infrastructure::lock::FileLockManager;
use acp_core::infrastructure::repositories::{
    FileAgentRepository, FileProjectRepository, FileTaskRepository,
};
use acp_swarm::application::worker::{
    MessageHandler, StandardMessageHandler, StopHandle, WorkerLoop, WorkerSettings, WorkerState,
};
use acp_swarm::domain::message::{Message, MessageType};
use acp_swarm::infrastructure::mailbox::{
    Delivery, FileMailbox, Mailbox, MailboxBatch, MailboxError, RejectedEntry, READ_DIR,
    REJECTED_DIR,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn manifest_for(agent: &str, inbox: PathBuf, layout: &CoordinationLayout) -> RoleManifest {
    RoleManifest {
        manifest_version: "1.0".to_string(),
        agent: ManifestAgent {
            id: agent.to_string(),
            slot_id: "s1".to_string(),
            session_key: "main-s1-test".to_string(),
        },
        role: ManifestRole {
            id: "backend-developer".to_string(),
            title: "Backend Developer".to_string(),
            responsibilities: vec![],
            permissions: vec![],
            escalation_path: vec![],
        },
        team: ManifestTeam {
            project: "demo".to_string(),
            sprint: "none".to_string(),
            reports_to: "team-lead".to_string(),
            teammates: vec![],
        },
        communication: ManifestCommunication {
            inbox,
            outbox: layout.outbox(),
            broadcast: layout.broadcast(),
        },
        context: ManifestContext { load_files: vec![] },
        constraints: ManifestConstraints {
            max_task_duration: "4h".to_string(),
            requires_review: true,
            can_deploy_to: vec!["dev".to_string()],
        },
    }
}

fn settings(poll: Duration) -> WorkerSettings {
    WorkerSettings {
        poll_interval: poll,
        max_backoff: poll * 4,
        max_delivery_attempts: 3,
        handle_signals: false,
    }
}

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
}

fn read_files(inbox: &Path) -> usize {
    std::fs::read_dir(inbox.join(READ_DIR))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_poll_orders_by_timestamp_not_filename() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("agent-x");
    let mailbox = FileMailbox::new();
    assert_ok!(mailbox.ensure(&inbox).await);

    // Filenames sort opposite to timestamps.
    let mut t2 = Message::new("lead", "agent-x", MessageType::Query, "demo").with_timestamp(at(2));
    t2.id = acp_swarm::MessageId("a".to_string());
    let mut t1 = Message::new("lead", "agent-x", MessageType::Query, "demo").with_timestamp(at(1));
    t1.id = acp_swarm::MessageId("c".to_string());
    let mut t3 = Message::new("lead", "agent-x", MessageType::Query, "demo").with_timestamp(at(3));
    t3.id = acp_swarm::MessageId("b".to_string());
    for msg in [&t2, &t1, &t3] {
        mailbox.enqueue(&inbox, msg).await.unwrap();
    }

    let batch = mailbox.poll(&inbox).await.unwrap();
    let order: Vec<_> = batch
        .deliveries
        .iter()
        .map(|d| d.message.timestamp)
        .collect();
    assert_eq!(order, vec![at(1), at(2), at(3)]);
}

#[tokio::test]
async fn test_ack_removes_message_permanently() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("agent-x");
    let mailbox = FileMailbox::new();
    mailbox.ensure(&inbox).await.unwrap();

    let msg = Message::new("lead", "agent-x", MessageType::Sync, "demo");
    mailbox.enqueue(&inbox, &msg).await.unwrap();

    let batch = mailbox.poll(&inbox).await.unwrap();
    assert_eq!(batch.deliveries.len(), 1);
    mailbox.ack(&inbox, &batch.deliveries[0]).await.unwrap();

    for _ in 0..3 {
        assert!(mailbox.poll(&inbox).await.unwrap().deliveries.is_empty());
    }
    assert!(inbox.join(READ_DIR).join(msg.file_name()).exists());

    // A second ack of the same delivery has nothing left to move.
    assert_err!(mailbox.ack(&inbox, &batch.deliveries[0]).await);
}

struct Project {
    _dir: TempDir,
    layout: CoordinationLayout,
    agents: Arc<FileAgentRepository>,
    tasks: TaskService,
    presence: AgentPresence,
}

async fn project_with_agent(agent: &str) -> Project {
    let dir = TempDir::new().unwrap();
    let layout = CoordinationLayout::with_defaults(dir.path());
    let projects = Arc::new(FileProjectRepository::new(layout.clone()));
    projects.initialize().await.unwrap();

    let locks = Arc::new(FileLockManager::new(layout.locks_dir(), LockConfig::default()));
    let agents = Arc::new(FileAgentRepository::new(layout.clone()));
    agents
        .save(&Agent::new(
            AgentId::new(agent),
            SlotId::new("s1"),
            "backend-developer",
            AgentProvider::Openclaw,
            "m1",
            "main-s1-test",
            Utc::now() - chrono::Duration::hours(1),
        ))
        .await
        .unwrap();

    let tasks = TaskService::new(
        Arc::new(FileTaskRepository::new(layout.clone())),
        projects,
        locks.clone(),
    );
    let presence = AgentPresence::new(agents.clone(), locks);
    Project {
        _dir: dir,
        layout,
        agents,
        tasks,
        presence,
    }
}

#[tokio::test]
async fn test_cycle_dispatches_acks_and_heartbeats() {
    let p = project_with_agent("agent-x").await;
    let inbox = p.layout.inbox(&AgentId::new("agent-x"));
    let mailbox = Arc::new(FileMailbox::new());

    let task = p
        .tasks
        .create(NewTask {
            title: "Implement auth".to_string(),
            assignee: Some("agent-x".to_string()),
            reporter: "cli-user".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    mailbox.ensure(&inbox).await.unwrap();
    let assign = Message::new("cli-user", "agent-x", MessageType::TaskAssign, "demo")
        .with_task(task.id.to_string())
        .with_timestamp(at(1));
    let bogus = Message::new("cli-user", "agent-x", MessageType::TaskAssign, "demo")
        .with_task("TASK-NONE")
        .with_timestamp(at(2));
    let sync = Message::new("lead", "agent-x", MessageType::Sync, "demo").with_timestamp(at(3));
    for msg in [&sync, &bogus, &assign] {
        mailbox.enqueue(&inbox, msg).await.unwrap();
    }
    std::fs::write(inbox.join("garbage.json"), "{ nope").unwrap();

    let before = p
        .agents
        .find_by_id(&AgentId::new("agent-x"))
        .await
        .unwrap()
        .unwrap()
        .last_active;

    let handler = Arc::new(StandardMessageHandler::new(
        AgentId::new("agent-x"),
        Some(p.tasks.clone()),
    ));
    let mut worker = WorkerLoop::new(
        &manifest_for("agent-x", inbox.clone(), &p.layout),
        mailbox.clone(),
        handler,
        Some(p.presence.clone()),
        settings(Duration::from_millis(10)),
    );

    let outcome = worker.run_cycle().await.unwrap();
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.handler_failures, 1);
    assert_eq!(outcome.ack_failures, 0);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(worker.state(), WorkerState::Polling);

    // The failed assignment stays in the inbox for the next cycle.
    let pending = mailbox.poll(&inbox).await.unwrap();
    assert_eq!(pending.deliveries.len(), 1);
    assert_eq!(pending.deliveries[0].message.id, bogus.id);
    assert_eq!(read_files(&inbox), 2);

    let started = p.tasks.get(&task.id).await.unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);

    let after = p
        .agents
        .find_by_id(&AgentId::new("agent-x"))
        .await
        .unwrap()
        .unwrap()
        .last_active;
    assert!(after > before);

    // Redelivering the same assignment is a no-op.
    mailbox.enqueue(&inbox, &assign).await.unwrap();
    let outcome = worker.run_cycle().await.unwrap();
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.handler_failures, 1);
    assert_eq!(
        p.tasks.get(&task.id).await.unwrap().started_at,
        started.started_at
    );

    // Third failed run of the bogus assignment moves it aside.
    let outcome = worker.run_cycle().await.unwrap();
    assert_eq!(outcome.handler_failures, 1);
    assert_eq!(outcome.rejected, 1);
    assert!(mailbox.poll(&inbox).await.unwrap().is_empty());
    assert!(inbox.join(REJECTED_DIR).join(bogus.file_name()).exists());
}

/// Fails its first call, succeeds afterwards.
struct FailsOnce {
    calls: AtomicUsize,
}

#[async_trait]
impl MessageHandler for FailsOnce {
    async fn handle(&self, _message: &Message) -> anyhow::Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("task lock busy");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_handler_leaves_message_for_next_cycle() {
    let dir = TempDir::new().unwrap();
    let layout = CoordinationLayout::with_defaults(dir.path());
    let inbox = layout.inbox(&AgentId::new("agent-x"));
    let mailbox = Arc::new(FileMailbox::new());
    mailbox.ensure(&inbox).await.unwrap();
    let msg = Message::new("lead", "agent-x", MessageType::TaskAssign, "demo").with_task("TASK-1");
    mailbox.enqueue(&inbox, &msg).await.unwrap();

    let handler = Arc::new(FailsOnce {
        calls: AtomicUsize::new(0),
    });
    let mut worker = WorkerLoop::new(
        &manifest_for("agent-x", inbox.clone(), &layout),
        mailbox,
        handler.clone(),
        None,
        settings(Duration::from_millis(5)),
    );

    let first = worker.run_cycle().await.unwrap();
    assert_eq!(first.processed, 0);
    assert_eq!(first.handler_failures, 1);
    assert!(inbox.join(msg.file_name()).exists());
    assert_eq!(read_files(&inbox), 0);

    let second = worker.run_cycle().await.unwrap();
    assert_eq!(second.processed, 1);
    assert_eq!(second.handler_failures, 0);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    assert!(inbox.join(READ_DIR).join(msg.file_name()).exists());
}

#[tokio::test]
async fn test_missing_agent_record_does_not_fail_cycle() {
    let p = project_with_agent("agent-x").await;
    let inbox = p.layout.inbox(&AgentId::new("ghost"));
    let mailbox = Arc::new(FileMailbox::new());
    mailbox.ensure(&inbox).await.unwrap();

    let mut worker = WorkerLoop::new(
        &manifest_for("ghost", inbox, &p.layout),
        mailbox,
        Arc::new(StandardMessageHandler::new(AgentId::new("ghost"), None)),
        Some(p.presence.clone()),
        settings(Duration::from_millis(10)),
    );
    assert_ok!(worker.run_cycle().await);
}

/// Fails the first `failures` polls, then behaves like a file mailbox.
struct FlakyMailbox {
    inner: FileMailbox,
    remaining_failures: AtomicUsize,
}

#[async_trait]
impl Mailbox for FlakyMailbox {
    async fn ensure(&self, inbox: &Path) -> Result<(), MailboxError> {
        self.inner.ensure(inbox).await
    }

    async fn enqueue(&self, inbox: &Path, message: &Message) -> Result<PathBuf, MailboxError> {
        self.inner.enqueue(inbox, message).await
    }

    async fn poll(&self, inbox: &Path) -> Result<MailboxBatch, MailboxError> {
        let left = self.remaining_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining_failures.store(left - 1, Ordering::SeqCst);
            return Err(MailboxError::MailboxUnavailable(inbox.to_path_buf()));
        }
        self.inner.poll(inbox).await
    }

    async fn ack(&self, inbox: &Path, delivery: &Delivery) -> Result<(), MailboxError> {
        self.inner.ack(inbox, delivery).await
    }

    async fn reject(&self, inbox: &Path, entry: &RejectedEntry) -> Result<(), MailboxError> {
        self.inner.reject(inbox, entry).await
    }
}

/// Requests a stop once it has seen `stop_after` messages.
struct StoppingHandler {
    seen: AtomicUsize,
    stop_after: usize,
    stop: OnceLock<StopHandle>,
}

#[async_trait]
impl MessageHandler for StoppingHandler {
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen >= self.stop_after {
            if let Some(stop) = self.stop.get() {
                stop.request_stop();
            }
        }
        if message.message_type == MessageType::Query {
            anyhow::bail!("queries are not supported by this handler");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_run_survives_errors_and_stops_between_cycles() {
    let dir = TempDir::new().unwrap();
    let layout = CoordinationLayout::with_defaults(dir.path());
    let inbox = layout.inbox(&AgentId::new("agent-x"));
    let mailbox = Arc::new(FlakyMailbox {
        inner: FileMailbox::new(),
        remaining_failures: AtomicUsize::new(2),
    });
    mailbox.ensure(&inbox).await.unwrap();

    let query = Message::new("lead", "agent-x", MessageType::Query, "demo").with_timestamp(at(1));
    let sync = Message::new("lead", "agent-x", MessageType::Sync, "demo").with_timestamp(at(2));
    mailbox.enqueue(&inbox, &query).await.unwrap();
    mailbox.enqueue(&inbox, &sync).await.unwrap();

    let handler = Arc::new(StoppingHandler {
        seen: AtomicUsize::new(0),
        stop_after: 1,
        stop: OnceLock::new(),
    });

    let mut worker = WorkerLoop::new(
        &manifest_for("agent-x", inbox.clone(), &layout),
        mailbox,
        handler.clone(),
        None,
        settings(Duration::from_millis(5)),
    );
    assert!(handler.stop.set(worker.stop_handle()).is_ok());

    let report = tokio::time::timeout(Duration::from_secs(10), worker.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert_eq!(report.cycle_errors, 2);
    // The stop was requested mid-batch; the batch still finished.
    assert_eq!(handler.seen.load(Ordering::SeqCst), 2);
    // The failed query is left for a later run.
    assert_eq!(report.messages_processed, 1);
    assert_eq!(read_files(&inbox), 1);
    assert!(inbox.join(query.file_name()).exists());
}

#[tokio::test]
async fn test_stop_before_first_cycle_polls_nothing() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("inbox").join("agent-x");
    let mailbox = Arc::new(FileMailbox::new());

    let mut worker = WorkerLoop::new(
        &manifest_for("agent-x", inbox.clone(), &CoordinationLayout::with_defaults(dir.path())),
        mailbox,
        Arc::new(StandardMessageHandler::new(AgentId::new("agent-x"), None)),
        None,
        settings(Duration::from_millis(5)),
    );
    worker.stop_handle().request_stop();

    let report = worker.run().await.unwrap();
    assert_eq!(report.cycles, 0);
    assert!(inbox.join(READ_DIR).is_dir());
    assert_eq!(worker.state(), WorkerState::Stopped);
}
