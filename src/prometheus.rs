//! Prometheus metric sink.

use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::metrics::MetricSink;
use crate::state::Transition;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct TransitionLabels {
    from: String,
    to: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: String,
}

/// A [`MetricSink`] backed by `prometheus-client` metrics.
#[derive(Debug, Clone)]
pub struct PrometheusSink {
    transitions: Family<TransitionLabels, Counter>,
    calls: Family<OutcomeLabels, Counter>,
    rejections: Counter,
    call_duration: Histogram,
    failure_count: Gauge,
}

impl PrometheusSink {
    /// Creates the metrics and registers them in `registry`.
    pub fn register(registry: &mut Registry) -> Self {
        let sink = Self {
            transitions: Family::default(),
            calls: Family::default(),
            rejections: Counter::default(),
            call_duration: Histogram::new(exponential_buckets(0.0005, 2.0, 16)),
            failure_count: Gauge::default(),
        };

        registry.register(
            "circuit_breaker_transitions",
            "State transitions applied to the circuit breaker",
            sink.transitions.clone(),
        );
        registry.register(
            "circuit_breaker_calls",
            "Guarded operations invoked, by outcome",
            sink.calls.clone(),
        );
        registry.register(
            "circuit_breaker_rejections",
            "Attempts skipped because the circuit was open",
            sink.rejections.clone(),
        );
        registry.register(
            "circuit_breaker_call_duration_seconds",
            "Duration of invoked guarded operations",
            sink.call_duration.clone(),
        );
        registry.register(
            "circuit_breaker_failure_count",
            "Failures recorded since the circuit last closed",
            sink.failure_count.clone(),
        );

        sink
    }
}

impl MetricSink for PrometheusSink {
    fn record_transition(&self, transition: Transition) {
        self.transitions
            .get_or_create(&TransitionLabels {
                from: transition.from.as_str().to_string(),
                to: transition.to.as_str().to_string(),
            })
            .inc();
    }

    fn record_call(&self, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.calls
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
        self.call_duration.observe(duration.as_secs_f64());
    }

    fn record_rejected(&self) {
        self.rejections.inc();
    }

    fn record_failure_count(&self, count: u32) {
        self.failure_count.set(i64::from(count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn sink_exports_recorded_events() {
        let mut registry = Registry::default();
        let sink = PrometheusSink::register(&mut registry);

        sink.record_transition(Transition {
            from: State::Closed,
            to: State::Open,
        });
        sink.record_call(false, Duration::from_millis(3));
        sink.record_rejected();
        sink.record_failure_count(6);

        let mut text = String::new();
        encode(&mut text, &registry).expect("encode metrics");

        assert!(text.contains("circuit_breaker_transitions_total{from=\"closed\",to=\"open\"} 1"));
        assert!(text.contains("circuit_breaker_calls_total{outcome=\"failure\"} 1"));
        assert!(text.contains("circuit_breaker_rejections_total 1"));
        assert!(text.contains("circuit_breaker_failure_count 6"));
        assert!(text.contains("circuit_breaker_call_duration_seconds_count 1"));
    }
}
