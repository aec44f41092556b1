//! Call counters and metric sinks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::state::Transition;

/// Trait for metrics sinks that can receive circuit breaker events.
///
/// Sinks are invoked after the breaker lock is released.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_transition(&self, transition: Transition);

    /// Records a guarded operation that was invoked.
    fn record_call(&self, success: bool, duration: Duration);

    /// Records a call blocked by an open circuit.
    fn record_rejected(&self);

    /// Records the failure count after it changed.
    fn record_failure_count(&self, count: u32);
}

/// A null metrics sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_transition(&self, _transition: Transition) {}
    fn record_call(&self, _success: bool, _duration: Duration) {}
    fn record_rejected(&self) {}
    fn record_failure_count(&self, _count: u32) {}
}

/// Point-in-time copy of a breaker's call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallStats {
    /// Operations that were invoked.
    pub calls: u64,
    /// Invoked operations that returned `Ok`.
    pub successes: u64,
    /// Invoked operations that returned `Err`.
    pub failures: u64,
    /// Attempts blocked by an open circuit.
    pub rejections: u64,
}

impl CallStats {
    /// Fraction of invoked operations that failed, `0.0` when nothing ran.
    pub fn error_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }

        self.failures as f64 / self.calls as f64
    }
}

/// Lock-free call counters, independent of the state machine.
#[derive(Debug, Default)]
pub(crate) struct BreakerStats {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl BreakerStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CallStats {
        CallStats {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
    }
}
