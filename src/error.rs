//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Result type for breaker construction and argument validation.
pub type BreakerResult<T> = Result<T, BreakerError>;

/// Errors raised synchronously by the breaker itself.
///
/// These never describe a failure of the guarded operation; those are
/// recorded on the breaker and surfaced through [`CallError`] or
/// [`CircuitBreaker::last_error`](crate::CircuitBreaker::last_error).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreakerError {
    /// The retry limit must be at least one.
    #[error("retry limit should be greater than 0, got {0}")]
    InvalidRetryLimit(u32),

    /// The cooldown timeout must be at least one millisecond.
    #[error("timeout should be at least 1ms, got {0:?}")]
    InvalidTimeout(Duration),

    /// No operation was supplied to guard.
    #[error("unable to attempt call, operation cannot be empty")]
    MissingOperation,
}

/// Error returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call).
#[derive(Debug)]
pub enum CallError<E> {
    /// The circuit is open, the operation was not invoked.
    Open,

    /// The operation ran and failed. The same error is kept as the
    /// breaker's last-attempt error.
    Operation(Arc<E>),
}

impl<E> CallError<E> {
    /// Returns `true` if the call was blocked by an open circuit.
    pub fn is_open(&self) -> bool {
        matches!(self, CallError::Open)
    }

    /// Returns the operation error, if the operation was invoked and failed.
    pub fn operation_error(&self) -> Option<&Arc<E>> {
        match self {
            CallError::Open => None,
            CallError::Operation(e) => Some(e),
        }
    }
}

impl<E> Clone for CallError<E> {
    fn clone(&self) -> Self {
        match self {
            CallError::Open => CallError::Open,
            CallError::Operation(e) => CallError::Operation(Arc::clone(e)),
        }
    }
}

impl<E> Display for CallError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Open => write!(f, "Circuit breaker is open"),
            CallError::Operation(e) => write!(f, "Operation error: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for CallError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CallError::Open => None,
            CallError::Operation(e) => Some(&**e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn breaker_error_messages_name_the_bad_value() {
        assert_eq!(
            BreakerError::InvalidRetryLimit(0).to_string(),
            "retry limit should be greater than 0, got 0"
        );
        assert!(BreakerError::InvalidTimeout(Duration::ZERO)
            .to_string()
            .contains("0ns"));
    }

    #[test]
    fn call_error_exposes_operation_source() {
        let err: CallError<io::Error> =
            CallError::Operation(Arc::new(io::Error::new(io::ErrorKind::Other, "boom")));
        assert!(!err.is_open());
        assert_eq!(err.to_string(), "Operation error: boom");
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".into()));

        let open: CallError<io::Error> = CallError::Open;
        assert!(open.is_open());
        assert!(open.source().is_none());
        assert!(open.operation_error().is_none());
    }
}
