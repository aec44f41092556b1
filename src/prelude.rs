//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust
//! use tripwire::prelude::*;
//!
//! let breaker = CircuitBreaker::<std::io::Error>::with_millis(3, 250).unwrap();
//! assert_eq!(breaker.current_state(), State::Closed);
//! ```

pub use crate::breaker::CircuitBreaker;
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{BreakerBuilder, BreakerConfig};
pub use crate::error::{BreakerError, BreakerResult, CallError};
pub use crate::state::State;
