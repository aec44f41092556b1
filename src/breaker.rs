//! Core circuit breaker implementation.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::config::{BreakerBuilder, BreakerConfig};
use crate::error::{BreakerError, BreakerResult, CallError};
use crate::hook::HookRegistry;
use crate::metrics::{BreakerStats, CallStats, MetricSink};
use crate::state::{State, StateMachine, Transition};

/// Everything the breaker lock protects.
struct Guarded<E> {
    machine: StateMachine,
    last_error: Option<Arc<E>>,
}

/// Inner state of the circuit breaker, shared between clones.
struct BreakerInner<E> {
    name: String,
    config: BreakerConfig,
    guarded: Mutex<Guarded<E>>,
    clock: Arc<dyn Clock>,
    stats: BreakerStats,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

/// A circuit breaker that guards calls to an operation that may fail.
///
/// Failures of the guarded operation are counted while the circuit is closed.
/// Once the count exceeds the retry limit the circuit opens and attempts are
/// skipped without invoking the operation. The first attempt made after the
/// timeout has elapsed moves the circuit to half-open and lets that attempt
/// through as a probe: success closes the circuit, failure opens it again.
///
/// There is no background timer. A circuit that nobody calls stays open.
///
/// Cloning is cheap and clones share state.
pub struct CircuitBreaker<E>
where
    E: Error + Send + Sync + 'static,
{
    inner: Arc<BreakerInner<E>>,
}

impl<E> CircuitBreaker<E>
where
    E: Error + Send + Sync + 'static,
{
    /// Creates a closed breaker with the given retry limit and cooldown.
    ///
    /// # Errors
    ///
    /// [`BreakerError::InvalidRetryLimit`] if `retry_limit` is zero,
    /// [`BreakerError::InvalidTimeout`] if `timeout` is under a millisecond.
    pub fn new(retry_limit: u32, timeout: Duration) -> BreakerResult<Self> {
        Self::from_config(BreakerConfig::new(retry_limit, timeout))
    }

    /// Like [`CircuitBreaker::new`] with the cooldown in milliseconds.
    pub fn with_millis(retry_limit: u32, timeout_ms: u64) -> BreakerResult<Self> {
        Self::new(retry_limit, Duration::from_millis(timeout_ms))
    }

    /// Creates a closed breaker from a configuration.
    pub fn from_config(config: BreakerConfig) -> BreakerResult<Self> {
        Self::builder().config(config).build()
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> BreakerBuilder<E> {
        BreakerBuilder::new()
    }

    pub(crate) fn assemble(
        name: String,
        config: BreakerConfig,
        clock: Arc<dyn Clock>,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let machine = StateMachine::new(config.retry_limit, config.timeout, clock.now());
        tracing::debug!(
            breaker = %name,
            retry_limit = config.retry_limit,
            timeout = ?config.timeout,
            "circuit breaker created"
        );

        let inner = BreakerInner {
            name,
            config,
            guarded: Mutex::new(Guarded {
                machine,
                last_error: None,
            }),
            clock,
            stats: BreakerStats::new(),
            metric_sink,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Attempts the operation and records its outcome.
    ///
    /// An error returned by the operation is never propagated; it is stored
    /// as [`last_error`](Self::last_error) and counted. When the circuit is
    /// open the operation is not invoked at all. Returns `self` for chaining.
    pub fn attempt_call<F, T>(&self, operation: F) -> &Self
    where
        F: FnOnce() -> Result<T, E>,
    {
        let _ = self.call(operation);
        self
    }

    /// [`attempt_call`](Self::attempt_call) for an operation that may be absent.
    ///
    /// # Errors
    ///
    /// [`BreakerError::MissingOperation`] if `operation` is `None`. The breaker
    /// is left untouched, including its last-attempt error.
    pub fn try_attempt_call<F, T>(&self, operation: Option<F>) -> BreakerResult<&Self>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let operation = operation.ok_or(BreakerError::MissingOperation)?;
        Ok(self.attempt_call(operation))
    }

    /// Attempts the operation and hands its result back.
    ///
    /// Follows the same protocol as [`attempt_call`](Self::attempt_call).
    ///
    /// # Errors
    ///
    /// [`CallError::Open`] if the operation was skipped, or
    /// [`CallError::Operation`] carrying the error also kept as the
    /// last-attempt error.
    pub fn call<F, T>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.pre_call()?;

        let start = self.inner.clock.now();
        let result = operation();
        let duration = self.inner.clock.now().saturating_duration_since(start);

        self.post_call(result, duration)
    }

    /// Clears the last error and lets the current state refresh itself.
    /// Rejects the attempt if the circuit is (still) open.
    fn pre_call(&self) -> Result<(), CallError<E>> {
        let now = self.inner.clock.now();
        let (admitted, transition) = {
            let mut guarded = self.inner.guarded.lock();
            guarded.last_error = None;
            let transition = guarded.machine.pre_call(now);
            (guarded.machine.current() != State::Open, transition)
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }

        if admitted {
            tracing::trace!(breaker = %self.inner.name, "call admitted");
            return Ok(());
        }

        tracing::debug!(breaker = %self.inner.name, "circuit open, call not attempted");
        self.inner.stats.record_rejection();
        self.inner.metric_sink.record_rejected();
        self.inner.hooks.execute_rejected_hook();
        Err(CallError::Open)
    }

    /// Feeds the outcome through the error hook (on failure) and then the
    /// post-call hook. Each hook runs under its own acquisition of the lock.
    fn post_call<T>(&self, result: Result<T, E>, duration: Duration) -> Result<T, CallError<E>> {
        let outcome = match result {
            Ok(value) => {
                self.inner.stats.record_success();
                self.inner.metric_sink.record_call(true, duration);
                self.inner.hooks.execute_success_hook();
                Ok(value)
            }
            Err(error) => {
                let error = Arc::new(error);
                self.on_error(&error);
                self.inner.stats.record_failure();
                self.inner.metric_sink.record_call(false, duration);
                self.inner.hooks.execute_failure_hook(&*error);
                Err(CallError::Operation(error))
            }
        };

        let now = self.inner.clock.now();
        let transition = self.inner.guarded.lock().machine.post_call(now);
        if let Some(transition) = transition {
            self.announce(transition);
        }

        outcome
    }

    fn on_error(&self, error: &Arc<E>) {
        let now = self.inner.clock.now();
        let (transition, failure_count, retry_limit) = {
            let mut guarded = self.inner.guarded.lock();
            guarded.last_error = Some(Arc::clone(error));
            let transition = guarded.machine.on_error(now);
            let tally = guarded.machine.tally();
            (transition, tally.failure_count(), tally.retry_limit())
        };

        tracing::debug!(
            breaker = %self.inner.name,
            error = %error,
            failure_count,
            "guarded operation failed"
        );
        self.inner.metric_sink.record_failure_count(failure_count);

        if let Some(transition) = transition {
            if transition.from == State::Closed {
                tracing::warn!(
                    breaker = %self.inner.name,
                    failure_count,
                    retry_limit,
                    "retry limit exceeded, opening circuit"
                );
            }
            self.announce(transition);
        }
    }

    /// Reports an applied transition. Never called with the lock held.
    fn announce(&self, transition: Transition) {
        tracing::info!(
            breaker = %self.inner.name,
            from = %transition.from,
            to = %transition.to,
            "circuit breaker state transition"
        );

        self.inner.metric_sink.record_transition(transition);
        if transition.to == State::Closed {
            self.inner.metric_sink.record_failure_count(0);
        }
        self.inner.hooks.execute_transition_hooks(transition);
    }

    /// Replaces the current state, running its entry side effect.
    pub(crate) fn move_to(&self, to: State) -> Transition {
        let now = self.inner.clock.now();
        let transition = self.inner.guarded.lock().machine.move_to(to, now);
        self.announce(transition);
        transition
    }

    /// Forces the circuit closed and resets the failure count.
    pub fn close(&self) {
        self.move_to(State::Closed);
    }

    /// Forces the circuit open, restarting the cooldown.
    pub fn open(&self) {
        self.move_to(State::Open);
    }

    /// Moves one step toward closed.
    ///
    /// Half-open closes, open becomes half-open, closed stays closed.
    /// Returns whether the circuit is now closed.
    pub fn try_close(&self) -> bool {
        self.step(|current| match current {
            State::HalfOpen => Some(State::Closed),
            State::Open => Some(State::HalfOpen),
            State::Closed => None,
        }) == State::Closed
    }

    /// Moves one step toward open.
    ///
    /// Half-open opens, closed becomes half-open, open stays open.
    /// Returns whether the circuit is now open.
    pub fn try_open(&self) -> bool {
        self.step(|current| match current {
            State::HalfOpen => Some(State::Open),
            State::Closed => Some(State::HalfOpen),
            State::Open => None,
        }) == State::Open
    }

    fn step(&self, next: impl FnOnce(State) -> Option<State>) -> State {
        let now = self.inner.clock.now();
        let (transition, current) = {
            let mut guarded = self.inner.guarded.lock();
            let transition = next(guarded.machine.current())
                .map(|to| guarded.machine.move_to(to, now));
            (transition, guarded.machine.current())
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }
        current
    }

    /// Gets the current state of the circuit breaker.
    ///
    /// An open circuit whose timeout has passed still reports [`State::Open`]
    /// until the next attempt.
    pub fn current_state(&self) -> State {
        self.inner.guarded.lock().machine.current()
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        self.current_state() == State::Closed
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        self.current_state() == State::Open
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        self.current_state() == State::HalfOpen
    }

    /// Failures recorded since the circuit last closed.
    pub fn failure_count(&self) -> u32 {
        self.inner.guarded.lock().machine.tally().failure_count()
    }

    /// `true` once the failure count is strictly greater than the retry limit.
    pub fn is_retry_limit_reached(&self) -> bool {
        self.inner
            .guarded
            .lock()
            .machine
            .tally()
            .is_retry_limit_reached()
    }

    /// The error of the most recent attempt, if that attempt failed.
    ///
    /// Cleared at the start of every attempt that reaches the state machine.
    pub fn last_error(&self) -> Option<Arc<E>> {
        self.inner.guarded.lock().last_error.clone()
    }

    /// Time left before the next attempt may probe, while open.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let now = self.inner.clock.now();
        let guarded = self.inner.guarded.lock();
        let opened_at = guarded.machine.opened_at()?;
        let deadline = opened_at.checked_add(guarded.machine.tally().timeout());
        Some(deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(now)))
    }

    /// The configured retry limit.
    pub fn retry_limit(&self) -> u32 {
        self.inner.config.retry_limit
    }

    /// The configured open-state cooldown.
    pub fn timeout(&self) -> Duration {
        self.inner.config.timeout
    }

    /// The name used in log events.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Call counters since creation or the last [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> CallStats {
        self.inner.stats.snapshot()
    }

    /// Resets the call counters. State and failure count are untouched.
    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }
}

// Allow cloning of circuit breakers - cheap because inner state is Arc'd
impl<E> Clone for CircuitBreaker<E>
where
    E: Error + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for CircuitBreaker<E>
where
    E: Error + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guarded = self.inner.guarded.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &guarded.machine.current())
            .field("failure_count", &guarded.machine.tally().failure_count())
            .field("retry_limit", &self.inner.config.retry_limit)
            .field("timeout", &self.inner.config.timeout)
            .finish()
    }
}

// Implement Async support when the feature is enabled
#[cfg(feature = "async")]
impl<E> CircuitBreaker<E>
where
    E: Error + Send + Sync + 'static,
{
    /// Async form of [`attempt_call`](Self::attempt_call).
    pub async fn attempt_call_async<F, Fut, T>(&self, operation: F) -> &Self
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let _ = self.call_async(operation).await;
        self
    }

    /// Async form of [`call`](Self::call). The lock is never held across
    /// the operation's await point.
    pub async fn call_async<F, Fut, T>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.pre_call()?;

        let start = self.inner.clock.now();
        let result = operation().await;
        let duration = self.inner.clock.now().saturating_duration_since(start);

        self.post_call(result, duration)
    }
}
