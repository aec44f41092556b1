//! # tripwire
//!
//! A circuit breaker that counts failures of a guarded operation and, once a
//! retry limit is exceeded, stops invoking it for a cooldown period before
//! cautiously probing recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation. Calls pass through and failures are counted.
//! - **Open**: Calls are skipped without touching the operation.
//! - **Half-Open**: The first attempt after the cooldown is let through as a
//!   probe. Success closes the circuit, failure opens it again.
//!
//! ```text
//! Closed ──[failure_count > retry_limit]──> Open
//!   ▲                                        │
//!   │                                        │ [timeout elapsed, checked on next attempt]
//!   │                                        ▼
//!   └──────────[probe succeeds]───────── HalfOpen
//!                 [probe fails] ──────────> Open
//! ```
//!
//! The open-to-half-open move is lazy: it is only evaluated when a call is
//! attempted. There is no background timer.
//!
//! ## Basic Usage
//!
//! ```rust
//! use tripwire::CircuitBreaker;
//! use std::fmt;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct ServiceError(String);
//!
//! impl fmt::Display for ServiceError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "Service error: {}", self.0)
//!     }
//! }
//!
//! impl std::error::Error for ServiceError {}
//!
//! let breaker = CircuitBreaker::<ServiceError>::new(5, Duration::from_millis(100))
//!     .expect("valid configuration");
//!
//! // Errors are recorded on the breaker, never returned.
//! breaker.attempt_call(|| Err::<(), _>(ServiceError("unavailable".into())));
//!
//! assert!(breaker.is_closed());
//! assert_eq!(breaker.failure_count(), 1);
//! assert!(breaker.last_error().is_some());
//! ```
//!
//! Use [`CircuitBreaker::call`] to get the operation's value back instead.
//!
//! ## Features
//!
//! - `std` - Standard library support (default)
//! - `async` - `attempt_call_async` / `call_async` and a Tokio clock
//! - `prometheus` - Prometheus metric sink
//! - `serde` - Serialize configuration, state and call statistics

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod clock;
mod config;
mod error;
mod hook;
mod metrics;
pub mod prelude;
#[cfg(feature = "prometheus")]
mod prometheus;
mod state;

// Re-exports
pub use breaker::CircuitBreaker;
#[cfg(feature = "async")]
pub use clock::TokioClock;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerBuilder, BreakerConfig, MIN_TIMEOUT};
pub use error::{BreakerError, BreakerResult, CallError};
pub use hook::HookRegistry;
pub use metrics::{CallStats, MetricSink, NullMetricSink};
#[cfg(feature = "prometheus")]
#[cfg_attr(docsrs, doc(cfg(feature = "prometheus")))]
pub use prometheus::PrometheusSink;
pub use state::{State, Transition};
