//! Configuration for circuit breakers.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::error::{BreakerError, BreakerResult};
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};

/// Smallest cooldown a breaker accepts.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

const DEFAULT_NAME: &str = "circuit-breaker";

/// The two values that fix a breaker's behaviour for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BreakerConfig {
    /// Failures tolerated while closed. The circuit opens on the failure
    /// after this many, i.e. once the count is strictly greater.
    pub retry_limit: u32,

    /// How long the circuit stays open before the next attempt may probe.
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            retry_limit: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Creates a configuration without validating it.
    pub fn new(retry_limit: u32, timeout: Duration) -> Self {
        Self {
            retry_limit,
            timeout,
        }
    }

    /// Checks both values are in range, retry limit first.
    pub fn validate(&self) -> BreakerResult<()> {
        if self.retry_limit < 1 {
            return Err(BreakerError::InvalidRetryLimit(self.retry_limit));
        }
        if self.timeout < MIN_TIMEOUT {
            return Err(BreakerError::InvalidTimeout(self.timeout));
        }
        Ok(())
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    name: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
    _error_type: PhantomData<fn() -> E>,
}

impl<E> Default for BreakerBuilder<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> BreakerBuilder<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            config: BreakerConfig::default(),
            clock: Arc::new(SystemClock),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
            _error_type: PhantomData,
        }
    }

    /// Sets the name used in log events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of failures tolerated before the circuit opens.
    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.config.retry_limit = retry_limit;
        self
    }

    /// Sets the open-state cooldown.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the open-state cooldown in milliseconds.
    pub fn timeout_millis(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    /// Replaces retry limit and timeout at once.
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the time source used for the cooldown.
    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Changes the error type for the builder.
    pub fn with_error_type<NewE>(self) -> BreakerBuilder<NewE>
    where
        NewE: std::error::Error + Send + Sync + 'static,
    {
        BreakerBuilder {
            name: self.name,
            config: self.config,
            clock: self.clock,
            metric_sink: self.metric_sink,
            hook_registry: self.hook_registry,
            _error_type: PhantomData,
        }
    }

    /// Validates the configuration and builds the breaker.
    ///
    /// # Errors
    ///
    /// [`BreakerError::InvalidRetryLimit`] or [`BreakerError::InvalidTimeout`]
    /// when either value is out of range.
    pub fn build(self) -> BreakerResult<CircuitBreaker<E>> {
        self.config.validate()?;

        Ok(CircuitBreaker::assemble(
            self.name,
            self.config,
            self.clock,
            self.metric_sink,
            self.hook_registry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(BreakerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_retry_limit_is_rejected() {
        let config = BreakerConfig::new(0, Duration::from_secs(1));
        assert_eq!(config.validate(), Err(BreakerError::InvalidRetryLimit(0)));
    }

    #[test]
    fn sub_millisecond_timeout_is_rejected() {
        let config = BreakerConfig::new(1, Duration::from_micros(999));
        assert_eq!(
            config.validate(),
            Err(BreakerError::InvalidTimeout(Duration::from_micros(999)))
        );
        assert_eq!(BreakerConfig::new(1, MIN_TIMEOUT).validate(), Ok(()));
    }

    #[test]
    fn retry_limit_is_checked_before_timeout() {
        let config = BreakerConfig::new(0, Duration::ZERO);
        assert_eq!(config.validate(), Err(BreakerError::InvalidRetryLimit(0)));
    }
}
