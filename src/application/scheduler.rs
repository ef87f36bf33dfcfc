//! Refresh Scheduler
//!
//! Decides whether a trigger may start a refresh cycle. Explicit state machine
//! (`Idle | Running` plus a cooldown expiry) evaluated against an injectable
//! clock on every trigger:
//!
//! - a trigger while `Running` is dropped, never queued
//! - an empty batch never starts a cycle
//! - a periodic tick inside the cooldown window is dropped
//! - a batch content change ignores the cooldown

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;

/// Minimum gap between timer-initiated cycles
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Time source for cooldown decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock; follows `tokio::time::pause` in tests
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    /// Position added or removed
    BatchChanged,
    /// Periodic timer fired
    TimerTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IgnoreReason {
    EmptyBatch,
    CycleRunning,
    CoolingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerDecision {
    /// Caller must run a cycle and call [`RefreshScheduler::complete`] after
    Start,
    Ignored(IgnoreReason),
}

impl TriggerDecision {
    pub fn should_start(&self) -> bool {
        matches!(self, TriggerDecision::Start)
    }
}

/// Single-flight refresh gate with a post-cycle cooldown
pub struct RefreshScheduler {
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    state: SchedulerState,
    cooldown_expires_at: Option<Instant>,
    cycles_started: u64,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("cooldown", &self.cooldown)
            .field("state", &self.state)
            .field("cooldown_expires_at", &self.cooldown_expires_at)
            .field("cycles_started", &self.cycles_started)
            .finish()
    }
}

impl RefreshScheduler {
    /// Starts idle with the cooldown already expired
    pub fn new(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cooldown,
            state: SchedulerState::Idle,
            cooldown_expires_at: None,
            cycles_started: 0,
        }
    }

    pub fn with_tokio_clock(cooldown: Duration) -> Self {
        Self::new(cooldown, Arc::new(TokioClock))
    }

    /// Evaluate `trigger` for a batch of `batch_len` positions.
    ///
    /// On `Start` the scheduler is already `Running`.
    pub fn on_trigger(&mut self, trigger: Trigger, batch_len: usize) -> TriggerDecision {
        let decision = self.evaluate(trigger, batch_len);
        match decision {
            TriggerDecision::Start => {
                self.state = SchedulerState::Running;
                self.cycles_started += 1;
                tracing::debug!("{:?} starts refresh cycle #{}", trigger, self.cycles_started);
            }
            TriggerDecision::Ignored(reason) => {
                tracing::debug!("{:?} ignored: {:?}", trigger, reason);
            }
        }
        decision
    }

    fn evaluate(&self, trigger: Trigger, batch_len: usize) -> TriggerDecision {
        if self.state == SchedulerState::Running {
            return TriggerDecision::Ignored(IgnoreReason::CycleRunning);
        }
        if batch_len == 0 {
            return TriggerDecision::Ignored(IgnoreReason::EmptyBatch);
        }
        if trigger == Trigger::TimerTick && self.cooldown_remaining().is_some() {
            return TriggerDecision::Ignored(IgnoreReason::CoolingDown);
        }
        TriggerDecision::Start
    }

    /// Cycle finished, whatever its outcome: back to idle, cooldown restarts
    pub fn complete(&mut self) {
        let now = self.clock.now();
        self.state = SchedulerState::Idle;
        self.cooldown_expires_at = Some(now + self.cooldown);
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles_started
    }

    /// Time left before a timer tick may start a cycle
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let expires_at = self.cooldown_expires_at?;
        let now = self.clock.now();
        (now < expires_at).then(|| expires_at - now)
    }
}
