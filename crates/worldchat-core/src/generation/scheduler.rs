//! Generation scheduler actor and the per-group handle table
//!
//! Each group gets one tokio task that owns its `GenerationState` and both
//! timers. Commands, timer firings and attempt completions are handled one at
//! a time, so the state machine never sees concurrent transitions.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use futures::future::OptionFuture;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::generator::{ConversationGenerator, GenerationError, GroupDirectory};
use super::parser::parse_response;
use super::policy::GenerationPolicy;
use super::sink::{persist_utterances, ConversationSink, PersistReport};
use super::state::{FailureOutcome, GenerationState, PauseReason, Phase, PhaseKind, Skip, Trigger};
use crate::constants::generation::COMMAND_BUFFER;
use crate::realtime::{ConversationHub, GroupEvent, NoticeLevel};

/// Point-in-time view of one scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub phase: PhaseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<PauseReason>,
    pub retry_count: u32,
    /// The periodic cycle has been started and not stopped
    pub running: bool,
    pub last_error: Option<String>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            phase: PhaseKind::Idle,
            pause_reason: None,
            retry_count: 0,
            running: false,
            last_error: None,
        }
    }
}

/// Collaborators shared by every scheduler
#[derive(Clone)]
pub struct SchedulerDeps {
    pub directory: Arc<dyn GroupDirectory>,
    pub generator: Arc<dyn ConversationGenerator>,
    pub sink: Arc<dyn ConversationSink>,
    pub hub: ConversationHub,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Stop,
    Pause,
    Resume,
    Trigger,
}

struct Command {
    op: Op,
    reply: oneshot::Sender<SchedulerStatus>,
}

type AttemptResult = Result<PersistReport, GenerationError>;

/// Cheap, cloneable handle to a running scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    group_id: String,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SchedulerStatus>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    async fn send(&self, op: Op) -> Result<SchedulerStatus> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command { op, reply })
            .await
            .map_err(|_| anyhow!("Scheduler for group {} has shut down", self.group_id))?;
        response
            .await
            .map_err(|_| anyhow!("Scheduler for group {} has shut down", self.group_id))
    }

    /// Attempt immediately, then every interval
    pub async fn start(&self) -> Result<SchedulerStatus> {
        self.send(Op::Start).await
    }

    /// Disarm both timers; idempotent
    pub async fn stop(&self) -> Result<SchedulerStatus> {
        self.send(Op::Stop).await
    }

    pub async fn pause(&self) -> Result<SchedulerStatus> {
        self.send(Op::Pause).await
    }

    /// Clear a pause, reset the retry budget and restart the cycle
    pub async fn resume(&self) -> Result<SchedulerStatus> {
        self.send(Op::Resume).await
    }

    /// One attempt through the usual guards
    pub async fn trigger(&self) -> Result<SchedulerStatus> {
        self.send(Op::Trigger).await
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// End the actor; its timers and any in-flight attempt die with it
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled() || self.commands.is_closed()
    }
}

/// The actor owning one group's generation loop
pub struct GenerationScheduler {
    group_id: String,
    policy: GenerationPolicy,
    deps: SchedulerDeps,
    state: GenerationState,
    running: bool,
    next_tick: Option<Instant>,
    retry_at: Option<Instant>,
    in_flight: Option<JoinHandle<AttemptResult>>,
    status_tx: watch::Sender<SchedulerStatus>,
}

impl GenerationScheduler {
    /// Spawn the actor on the current runtime
    pub fn spawn(
        group_id: impl Into<String>,
        policy: GenerationPolicy,
        deps: SchedulerDeps,
    ) -> SchedulerHandle {
        let group_id = group_id.into();
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status) = watch::channel(SchedulerStatus::default());
        let cancel = CancellationToken::new();

        let actor = Self {
            group_id: group_id.clone(),
            policy,
            deps,
            state: GenerationState::new(),
            running: false,
            next_tick: None,
            retry_at: None,
            in_flight: None,
            status_tx,
        };
        tokio::spawn(actor.run(command_rx, cancel.clone()));

        SchedulerHandle {
            group_id,
            commands,
            status,
            cancel,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
        debug!(group = %self.group_id, "Generation scheduler started");

        loop {
            let next_tick = self.next_tick;
            let retry_at = self.retry_at;
            let has_in_flight = self.in_flight.is_some();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                command = commands.recv() => match command {
                    Some(Command { op, reply }) => {
                        self.handle(op).await;
                        self.publish_status();
                        let _ = reply.send(self.status());
                        continue;
                    }
                    None => break,
                },

                Some(result) = OptionFuture::from(self.in_flight.as_mut()), if has_in_flight => {
                    self.in_flight = None;
                    self.on_complete(result);
                }

                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.attempt(Trigger::Retry).await;
                }

                _ = sleep_until(next_tick.unwrap_or_else(Instant::now)), if next_tick.is_some() => {
                    self.next_tick = next_tick.map(|at| at + self.policy.min_interval);
                    self.attempt(Trigger::Periodic).await;
                }
            }

            self.publish_status();
        }

        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        debug!(group = %self.group_id, "Generation scheduler stopped");
    }

    async fn handle(&mut self, op: Op) {
        match op {
            Op::Start => {
                info!(group = %self.group_id, "Starting generation cycle");
                self.running = true;
                self.next_tick = Some(Instant::now() + self.policy.min_interval);
                self.attempt(Trigger::Start).await;
            }
            Op::Stop => {
                if self.running {
                    info!(group = %self.group_id, "Stopping generation cycle");
                }
                self.running = false;
                self.disarm();
                self.state.stop();
            }
            Op::Pause => {
                if self.state.pause() {
                    info!(group = %self.group_id, "Generation paused");
                    self.disarm();
                }
            }
            Op::Resume => {
                if self.state.resume() {
                    info!(group = %self.group_id, "Generation resumed");
                    self.running = true;
                    self.next_tick = Some(Instant::now() + self.policy.min_interval);
                    self.attempt(Trigger::Start).await;
                }
            }
            Op::Trigger => self.attempt(Trigger::Manual).await,
        }
    }

    fn disarm(&mut self) {
        self.next_tick = None;
        self.retry_at = None;
    }

    async fn attempt(&mut self, trigger: Trigger) {
        let now = Instant::now();
        let interval = self.policy.min_interval;

        if let Err(skip) = self.state.check(now, trigger, interval) {
            self.on_skip(skip, trigger, now);
            return;
        }

        let snapshot = match self.deps.directory.snapshot(&self.group_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let outcome = self
                    .state
                    .record_lookup_failure(now, &err, &self.policy.retry);
                self.apply_failure(outcome, &err);
                return;
            }
        };

        if let Err(skip) = self
            .state
            .try_begin(now, snapshot.members.len(), trigger, interval)
        {
            self.on_skip(skip, trigger, now);
            return;
        }

        self.retry_at = None;
        debug!(
            group = %self.group_id,
            trigger = ?trigger,
            members = snapshot.members.len(),
            "Requesting generation"
        );

        let deps = self.deps.clone();
        let group_id = self.group_id.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let raw = deps.generator.continue_group(&snapshot).await?;
            let utterances = parse_response(&raw, &snapshot.members);
            Ok(persist_utterances(deps.sink.as_ref(), &group_id, &utterances).await)
        }));
    }

    fn on_skip(&mut self, skip: Skip, trigger: Trigger, now: Instant) {
        match (skip, trigger) {
            (Skip::RateLimited { remaining }, Trigger::Retry) => {
                debug!(
                    group = %self.group_id,
                    remaining_ms = remaining.as_millis() as u64,
                    "Retry deferred by rate limit"
                );
                self.retry_at = Some(now + remaining);
            }
            (skip, Trigger::Retry) => {
                // Leave BackoffWait so periodic ticks carry the cycle on
                debug!(group = %self.group_id, "Dropping retry: {}", skip);
                self.state.stop();
            }
            _ => debug!(group = %self.group_id, trigger = ?trigger, "Skipping generation: {}", skip),
        }
    }

    fn on_complete(&mut self, result: Result<AttemptResult, JoinError>) {
        let result = result.unwrap_or_else(|e| {
            Err(GenerationError::Transport(format!(
                "generation task ended abnormally: {e}"
            )))
        });

        match result {
            Ok(report) => {
                let paused = self.state.complete_success();
                info!(
                    group = %self.group_id,
                    parsed = report.parsed,
                    persisted = report.persisted,
                    failed = report.failed,
                    "Generation cycle complete"
                );
                if paused {
                    self.disarm();
                } else if self.running {
                    self.next_tick = Some(Instant::now() + self.policy.min_interval);
                }
            }
            Err(err) => {
                let outcome = self.state.complete_failure(&err, &self.policy.retry);
                self.apply_failure(outcome, &err);
            }
        }
    }

    fn apply_failure(&mut self, outcome: FailureOutcome, err: &GenerationError) {
        match outcome {
            FailureOutcome::RetryAfter(delay) if self.running => {
                warn!(
                    group = %self.group_id,
                    retry = self.state.retry_count(),
                    delay_ms = delay.as_millis() as u64,
                    "Generation failed, retrying: {}",
                    err
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            FailureOutcome::RetryAfter(_) => {
                warn!(group = %self.group_id, "Generation failed outside the cycle: {}", err);
                self.state.stop();
            }
            FailureOutcome::Exhausted => {
                error!(
                    group = %self.group_id,
                    retries = self.state.retry_count(),
                    "Generation paused after exhausting retries: {}",
                    err
                );
                self.disarm();
                self.deps.hub.notice(
                    &self.group_id,
                    NoticeLevel::Error,
                    format!(
                        "Conversation generation paused after {} failed retries ({}). Resume to try again.",
                        self.state.retry_count(),
                        err
                    ),
                );
            }
            FailureOutcome::Misconfigured => {
                error!(group = %self.group_id, "Generation paused: {}", err);
                self.disarm();
                self.deps.hub.notice(
                    &self.group_id,
                    NoticeLevel::Error,
                    format!("Conversation generation paused: {err}"),
                );
            }
            FailureOutcome::Paused => {
                debug!(group = %self.group_id, "Attempt failed after pause: {}", err);
                self.disarm();
            }
        }
    }

    fn status(&self) -> SchedulerStatus {
        let phase = self.state.phase();
        SchedulerStatus {
            phase: phase.kind(),
            pause_reason: match phase {
                Phase::Paused(reason) => Some(reason),
                _ => None,
            },
            retry_count: self.state.retry_count(),
            running: self.running,
            last_error: self.state.last_error().map(str::to_string),
        }
    }

    fn publish_status(&self) {
        let status = self.status();
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status.clone();
            true
        });
        if changed {
            self.deps
                .hub
                .publish(&self.group_id, GroupEvent::Status { status });
        }
    }
}

/// One scheduler per world group, created on first use
pub struct SchedulerRegistry {
    schedulers: DashMap<String, SchedulerHandle>,
    policy: GenerationPolicy,
    deps: SchedulerDeps,
}

impl SchedulerRegistry {
    pub fn new(policy: GenerationPolicy, deps: SchedulerDeps) -> Self {
        Self {
            schedulers: DashMap::new(),
            policy,
            deps,
        }
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    pub fn hub(&self) -> &ConversationHub {
        &self.deps.hub
    }

    /// Handle for `group_id`, spawning a scheduler if none is live
    pub fn handle(&self, group_id: &str) -> SchedulerHandle {
        let mut entry = self
            .schedulers
            .entry(group_id.to_string())
            .or_insert_with(|| GenerationScheduler::spawn(group_id, self.policy, self.deps.clone()));
        if entry.is_disposed() {
            *entry = GenerationScheduler::spawn(group_id, self.policy, self.deps.clone());
        }
        entry.clone()
    }

    pub async fn start(&self, group_id: &str) -> Result<SchedulerStatus> {
        self.handle(group_id).start().await
    }

    /// No-op for groups without a scheduler
    pub async fn stop(&self, group_id: &str) -> Result<SchedulerStatus> {
        let existing = self.schedulers.get(group_id).map(|h| h.clone());
        match existing {
            Some(handle) if !handle.is_disposed() => handle.stop().await,
            _ => Ok(SchedulerStatus::default()),
        }
    }

    pub async fn pause(&self, group_id: &str) -> Result<SchedulerStatus> {
        self.handle(group_id).pause().await
    }

    pub async fn resume(&self, group_id: &str) -> Result<SchedulerStatus> {
        self.handle(group_id).resume().await
    }

    pub async fn trigger(&self, group_id: &str) -> Result<SchedulerStatus> {
        self.handle(group_id).trigger().await
    }

    pub fn status(&self, group_id: &str) -> SchedulerStatus {
        self.schedulers
            .get(group_id)
            .map(|h| h.status())
            .unwrap_or_default()
    }

    /// Tear down a group's scheduler; idempotent
    pub fn dispose(&self, group_id: &str) {
        if let Some((_, handle)) = self.schedulers.remove(group_id) {
            debug!(group = group_id, "Disposing generation scheduler");
            handle.dispose();
        }
    }

    pub fn shutdown_all(&self) {
        for entry in self.schedulers.iter() {
            entry.value().dispose();
        }
        self.schedulers.clear();
    }

    pub fn active_count(&self) -> usize {
        self.schedulers.len()
    }
}
