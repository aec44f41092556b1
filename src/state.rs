//! Circuit breaker state machine implementation.
//!
//! Each state is a strategy with the same set of hooks. A hook never moves the
//! breaker itself; it names the state to move to and [`StateMachine`] performs
//! the move, running the entry side effects of the new state exactly once.

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum State {
    /// Circuit is closed and operations are allowed. Failures are counted.
    Closed,

    /// Circuit is open and operations are not invoked.
    Open,

    /// Circuit lets a single probe through to test recovery.
    HalfOpen,
}

impl State {
    /// Short lowercase name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change that has been applied to a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the move.
    pub from: State,
    /// State after the move.
    pub to: State,
}

/// Breaker fields the state hooks are allowed to read and mutate.
#[derive(Debug)]
pub(crate) struct Tally {
    failure_count: u32,
    retry_limit: u32,
    timeout: Duration,
}

impl Tally {
    pub(crate) fn new(retry_limit: u32, timeout: Duration) -> Self {
        Self {
            failure_count: 0,
            retry_limit,
            timeout,
        }
    }

    pub(crate) fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub(crate) fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The limit is only reached once the count goes past it.
    pub(crate) fn is_retry_limit_reached(&self) -> bool {
        self.failure_count > self.retry_limit
    }

    fn increment_failure_count(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
    }

    fn reset_failure_count(&mut self) {
        self.failure_count = 0;
    }
}

/// Per-state strategy. Open carries the instant it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

impl Phase {
    /// Builds the phase for `state`, running its entry side effect.
    fn enter(state: State, tally: &mut Tally, now: Instant) -> Self {
        match state {
            State::Closed => {
                tally.reset_failure_count();
                Phase::Closed
            }
            State::Open => Phase::Open { opened_at: now },
            State::HalfOpen => Phase::HalfOpen,
        }
    }

    fn identify(&self) -> State {
        match self {
            Phase::Closed => State::Closed,
            Phase::Open { .. } => State::Open,
            Phase::HalfOpen => State::HalfOpen,
        }
    }

    fn on_pre_call(&self, tally: &Tally, now: Instant) -> Option<State> {
        match self {
            Phase::Open { .. } => self.refresh(tally, now),
            Phase::Closed | Phase::HalfOpen => None,
        }
    }

    fn on_post_call(&self) -> Option<State> {
        match self {
            Phase::HalfOpen => Some(State::Closed),
            Phase::Closed | Phase::Open { .. } => None,
        }
    }

    fn on_error(&self, tally: &mut Tally) -> Option<State> {
        // every state counts the failure, even Open
        tally.increment_failure_count();

        match self {
            Phase::Closed if tally.is_retry_limit_reached() => Some(State::Open),
            Phase::Closed => None,
            Phase::Open { .. } => None,
            Phase::HalfOpen => Some(State::Open),
        }
    }

    fn refresh(&self, tally: &Tally, now: Instant) -> Option<State> {
        match self {
            Phase::Open { opened_at } => match opened_at.checked_add(tally.timeout) {
                Some(deadline) if now >= deadline => Some(State::HalfOpen),
                _ => None,
            },
            Phase::Closed | Phase::HalfOpen => None,
        }
    }
}

/// Current phase plus the counters it operates on.
///
/// Not synchronised; the breaker keeps it behind its lock.
#[derive(Debug)]
pub(crate) struct StateMachine {
    phase: Phase,
    tally: Tally,
}

impl StateMachine {
    /// Creates a machine in the closed state.
    pub(crate) fn new(retry_limit: u32, timeout: Duration, now: Instant) -> Self {
        let mut tally = Tally::new(retry_limit, timeout);
        let phase = Phase::enter(State::Closed, &mut tally, now);
        Self { phase, tally }
    }

    pub(crate) fn current(&self) -> State {
        self.phase.identify()
    }

    pub(crate) fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Instant the circuit opened, while it is open.
    pub(crate) fn opened_at(&self) -> Option<Instant> {
        match self.phase {
            Phase::Open { opened_at } => Some(opened_at),
            _ => None,
        }
    }

    /// Replaces the current phase unconditionally, even with the same state.
    pub(crate) fn move_to(&mut self, to: State, now: Instant) -> Transition {
        let from = self.current();
        self.phase = Phase::enter(to, &mut self.tally, now);
        Transition { from, to }
    }

    pub(crate) fn pre_call(&mut self, now: Instant) -> Option<Transition> {
        let next = self.phase.on_pre_call(&self.tally, now);
        next.map(|to| self.move_to(to, now))
    }

    pub(crate) fn on_error(&mut self, now: Instant) -> Option<Transition> {
        let next = self.phase.on_error(&mut self.tally);
        next.map(|to| self.move_to(to, now))
    }

    pub(crate) fn post_call(&mut self, now: Instant) -> Option<Transition> {
        let next = self.phase.on_post_call();
        next.map(|to| self.move_to(to, now))
    }
}
