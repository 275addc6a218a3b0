//! Per-group generation state machine
//!
//! `Idle -> Requesting -> {Idle | BackoffWait -> Requesting | Paused}`.
//! Transitions are pure: the scheduler actor feeds in the clock and applies
//! the returned outcomes to its timers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::generator::GenerationError;
use crate::ai::retry::RetryConfig;

/// Why a scheduler sits in `Paused`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    User,
    RetriesExhausted,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A provider call is outstanding; `then_pause` records a pause requested meanwhile
    Requesting { then_pause: bool },
    BackoffWait,
    Paused(PauseReason),
}

/// Wire form of `Phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Idle,
    Requesting,
    BackoffWait,
    Paused,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::Requesting { .. } => PhaseKind::Requesting,
            Phase::BackoffWait => PhaseKind::BackoffWait,
            Phase::Paused(_) => PhaseKind::Paused,
        }
    }
}

/// What asked for an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// `start()` or `resume()`
    Start,
    Periodic,
    Retry,
    Manual,
}

/// Reason an attempt did not go out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    AlreadyGenerating,
    Paused,
    /// Periodic ticks yield to a pending retry
    AwaitingRetry,
    NoMembers,
    RateLimited { remaining: Duration },
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::AlreadyGenerating => f.write_str("a generation is already in flight"),
            Skip::Paused => f.write_str("generation is paused"),
            Skip::AwaitingRetry => f.write_str("a retry is pending"),
            Skip::NoMembers => f.write_str("the group has no members"),
            Skip::RateLimited { remaining } => {
                write!(f, "rate limited for another {}ms", remaining.as_millis())
            }
        }
    }
}

/// What the scheduler should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Arm a one-shot retry
    RetryAfter(Duration),
    /// Budget spent; paused
    Exhausted,
    /// Not retriable; paused
    Misconfigured,
    /// A user pause arrived during the request
    Paused,
}

#[derive(Debug, Clone)]
pub struct GenerationState {
    phase: Phase,
    retry_count: u32,
    last_request: Option<Instant>,
    last_error: Option<String>,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            retry_count: 0,
            last_request: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, Phase::Paused(_))
    }

    /// Every guard that does not need the member list
    pub fn check(&self, now: Instant, trigger: Trigger, min_interval: Duration) -> Result<(), Skip> {
        self.check_phase(trigger)?;
        self.check_rate_limit(now, min_interval)
    }

    fn check_phase(&self, trigger: Trigger) -> Result<(), Skip> {
        match self.phase {
            Phase::Requesting { .. } => Err(Skip::AlreadyGenerating),
            Phase::Paused(_) => Err(Skip::Paused),
            Phase::BackoffWait if trigger == Trigger::Periodic => Err(Skip::AwaitingRetry),
            Phase::Idle | Phase::BackoffWait => Ok(()),
        }
    }

    fn check_rate_limit(&self, now: Instant, min_interval: Duration) -> Result<(), Skip> {
        if let Some(last) = self.last_request {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < min_interval {
                return Err(Skip::RateLimited {
                    remaining: min_interval - elapsed,
                });
            }
        }
        Ok(())
    }

    /// Run every guard and, if they pass, enter `Requesting`
    ///
    /// `last_request` is stamped here, before the provider call goes out.
    pub fn try_begin(
        &mut self,
        now: Instant,
        member_count: usize,
        trigger: Trigger,
        min_interval: Duration,
    ) -> Result<(), Skip> {
        self.check_phase(trigger)?;
        if member_count == 0 {
            return Err(Skip::NoMembers);
        }
        self.check_rate_limit(now, min_interval)?;

        self.phase = Phase::Requesting { then_pause: false };
        self.last_request = Some(now);
        Ok(())
    }

    /// Success resets the retry budget
    ///
    /// Returns true when a pause requested during the call took effect.
    pub fn complete_success(&mut self) -> bool {
        let paused = matches!(self.phase, Phase::Requesting { then_pause: true });
        self.retry_count = 0;
        self.last_error = None;
        self.phase = if paused {
            Phase::Paused(PauseReason::User)
        } else {
            Phase::Idle
        };
        paused
    }

    pub fn complete_failure(
        &mut self,
        error: &GenerationError,
        retry: &RetryConfig,
    ) -> FailureOutcome {
        self.last_error = Some(error.to_string());

        if matches!(self.phase, Phase::Requesting { then_pause: true }) {
            self.phase = Phase::Paused(PauseReason::User);
            return FailureOutcome::Paused;
        }

        if !error.is_retryable() {
            self.phase = Phase::Paused(PauseReason::Configuration);
            return FailureOutcome::Misconfigured;
        }

        if self.retry_count < retry.max_retries {
            let delay = retry.delay_for_attempt(self.retry_count);
            self.retry_count += 1;
            self.phase = Phase::BackoffWait;
            FailureOutcome::RetryAfter(delay)
        } else {
            self.phase = Phase::Paused(PauseReason::RetriesExhausted);
            FailureOutcome::Exhausted
        }
    }

    /// A member lookup failed before the provider call; counts as a failed attempt
    pub fn record_lookup_failure(
        &mut self,
        now: Instant,
        error: &GenerationError,
        retry: &RetryConfig,
    ) -> FailureOutcome {
        self.phase = Phase::Requesting { then_pause: false };
        self.last_request = Some(now);
        self.complete_failure(error, retry)
    }

    /// Returns true if the phase changed
    pub fn pause(&mut self) -> bool {
        match self.phase {
            Phase::Requesting { then_pause: false } => {
                self.phase = Phase::Requesting { then_pause: true };
                true
            }
            Phase::Idle | Phase::BackoffWait => {
                self.phase = Phase::Paused(PauseReason::User);
                true
            }
            Phase::Requesting { then_pause: true } | Phase::Paused(_) => false,
        }
    }

    /// Leave `Paused` with a fresh retry budget; returns true if it was paused
    pub fn resume(&mut self) -> bool {
        match self.phase {
            Phase::Paused(_) => {
                self.phase = Phase::Idle;
                self.retry_count = 0;
                self.last_error = None;
                true
            }
            Phase::Requesting { then_pause: true } => {
                self.phase = Phase::Requesting { then_pause: false };
                self.retry_count = 0;
                true
            }
            _ => false,
        }
    }

    /// Drop a pending retry; an in-flight request is left to complete
    pub fn stop(&mut self) {
        if self.phase == Phase::BackoffWait {
            self.phase = Phase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(15_000);

    fn transport() -> GenerationError {
        GenerationError::Transport("connection reset".into())
    }

    #[test]
    fn test_rate_limit_window() {
        let t0 = Instant::now();
        let mut state = GenerationState::new();

        state.try_begin(t0, 2, Trigger::Start, INTERVAL).unwrap();
        assert!(!state.complete_success());

        let early = state.try_begin(t0 + Duration::from_millis(10_000), 2, Trigger::Periodic, INTERVAL);
        assert_eq!(
            early,
            Err(Skip::RateLimited {
                remaining: Duration::from_millis(5_000)
            })
        );
        assert_eq!(state.phase(), Phase::Idle);

        state
            .try_begin(t0 + Duration::from_millis(15_000), 2, Trigger::Periodic, INTERVAL)
            .unwrap();
        assert_eq!(state.phase(), Phase::Requesting { then_pause: false });
    }

    #[test]
    fn test_guard_order() {
        let now = Instant::now();
        let mut state = GenerationState::new();

        assert_eq!(
            state.try_begin(now, 0, Trigger::Manual, INTERVAL),
            Err(Skip::NoMembers)
        );

        state.try_begin(now, 1, Trigger::Manual, INTERVAL).unwrap();
        assert_eq!(
            state.try_begin(now, 1, Trigger::Manual, INTERVAL),
            Err(Skip::AlreadyGenerating)
        );
        assert_eq!(
            state.check(now, Trigger::Manual, INTERVAL),
            Err(Skip::AlreadyGenerating)
        );

        state.complete_success();
        state.pause();
        assert_eq!(
            state.try_begin(now + INTERVAL, 1, Trigger::Start, INTERVAL),
            Err(Skip::Paused)
        );
    }

    #[test]
    fn test_retry_budget_then_pause() {
        let retry = RetryConfig::default();
        let mut now = Instant::now();
        let mut state = GenerationState::new();
        let mut delays = Vec::new();

        state.try_begin(now, 1, Trigger::Start, INTERVAL).unwrap();
        loop {
            match state.complete_failure(&transport(), &retry) {
                FailureOutcome::RetryAfter(delay) => {
                    delays.push(delay.as_millis() as u64);
                    now += INTERVAL.max(delay);
                    state.try_begin(now, 1, Trigger::Retry, INTERVAL).unwrap();
                }
                outcome => {
                    assert_eq!(outcome, FailureOutcome::Exhausted);
                    break;
                }
            }
        }

        assert_eq!(delays, vec![5000, 10000, 20000, 30000, 30000]);
        assert_eq!(state.phase(), Phase::Paused(PauseReason::RetriesExhausted));
        assert_eq!(state.retry_count(), 5);
        assert_eq!(
            state.try_begin(now + INTERVAL, 1, Trigger::Periodic, INTERVAL),
            Err(Skip::Paused)
        );

        assert!(state.resume());
        assert_eq!(state.retry_count(), 0);
        assert!(state.last_error().is_none());
        state
            .try_begin(now + INTERVAL, 1, Trigger::Start, INTERVAL)
            .unwrap();
    }

    #[test]
    fn test_success_resets_retry_count() {
        let retry = RetryConfig::default();
        let now = Instant::now();
        let mut state = GenerationState::new();

        state.try_begin(now, 1, Trigger::Start, INTERVAL).unwrap();
        state.complete_failure(&transport(), &retry);
        state.try_begin(now + INTERVAL, 1, Trigger::Retry, INTERVAL).unwrap();
        state.complete_failure(&transport(), &retry);
        assert_eq!(state.retry_count(), 2);

        state
            .try_begin(now + INTERVAL * 2, 1, Trigger::Retry, INTERVAL)
            .unwrap();
        state.complete_success();
        assert_eq!(state.retry_count(), 0);
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_periodic_yields_to_pending_retry() {
        let now = Instant::now();
        let mut state = GenerationState::new();

        state.try_begin(now, 1, Trigger::Start, INTERVAL).unwrap();
        state.complete_failure(&transport(), &RetryConfig::default());

        let later = now + INTERVAL;
        assert_eq!(
            state.check(later, Trigger::Periodic, INTERVAL),
            Err(Skip::AwaitingRetry)
        );
        assert_eq!(state.check(later, Trigger::Retry, INTERVAL), Ok(()));
        assert_eq!(state.check(later, Trigger::Manual, INTERVAL), Ok(()));
    }

    #[test]
    fn test_configuration_error_pauses_without_retry() {
        let now = Instant::now();
        let mut state = GenerationState::new();

        state.try_begin(now, 1, Trigger::Start, INTERVAL).unwrap();
        let outcome = state.complete_failure(
            &GenerationError::Configuration("no API key".into()),
            &RetryConfig::default(),
        );

        assert_eq!(outcome, FailureOutcome::Misconfigured);
        assert_eq!(state.phase(), Phase::Paused(PauseReason::Configuration));
        assert_eq!(state.retry_count(), 0);
        assert!(state.last_error().unwrap().contains("no API key"));
    }

    #[test]
    fn test_pause_during_request_applies_on_completion() {
        let now = Instant::now();
        let mut state = GenerationState::new();

        state.try_begin(now, 1, Trigger::Start, INTERVAL).unwrap();
        assert!(state.pause());
        assert!(!state.pause());
        assert!(state.complete_success());
        assert_eq!(state.phase(), Phase::Paused(PauseReason::User));

        let mut failing = GenerationState::new();
        failing.try_begin(now, 1, Trigger::Start, INTERVAL).unwrap();
        failing.pause();
        assert_eq!(
            failing.complete_failure(&transport(), &RetryConfig::default()),
            FailureOutcome::Paused
        );
    }

    #[test]
    fn test_stop_clears_backoff_only() {
        let now = Instant::now();
        let mut state = GenerationState::new();

        state.stop();
        assert_eq!(state.phase(), Phase::Idle);

        state.try_begin(now, 1, Trigger::Start, INTERVAL).unwrap();
        state.stop();
        assert_eq!(state.phase(), Phase::Requesting { then_pause: false });

        state.complete_failure(&transport(), &RetryConfig::default());
        assert_eq!(state.phase(), Phase::BackoffWait);
        state.stop();
        state.stop();
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_lookup_failure_counts_as_attempt() {
        let now = Instant::now();
        let mut state = GenerationState::new();

        let outcome = state.record_lookup_failure(
            now,
            &GenerationError::Directory("database locked".into()),
            &RetryConfig::default(),
        );
        assert_eq!(outcome, FailureOutcome::RetryAfter(Duration::from_millis(5000)));
        assert_eq!(state.retry_count(), 1);
        assert!(matches!(
            state.check(now + Duration::from_secs(1), Trigger::Retry, INTERVAL),
            Err(Skip::RateLimited { .. })
        ));
    }
}
