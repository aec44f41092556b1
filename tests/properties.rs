use std::fmt;
use std::time::Duration;

use proptest::prelude::*;
use tripwire::{BreakerError, CircuitBreaker, ManualClock, State};

#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom")
    }
}

impl std::error::Error for Boom {}

fn breaker(retry_limit: u32, timeout_ms: u64) -> (CircuitBreaker<Boom>, ManualClock) {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder()
        .retry_limit(retry_limit)
        .timeout_millis(timeout_ms)
        .clock(clock.clone())
        .build()
        .unwrap();
    (breaker, clock)
}

proptest! {
    #[test]
    fn fresh_breakers_are_closed(retry_limit in 1u32..10_000, timeout_ms in 1u64..10_000_000) {
        let breaker = CircuitBreaker::<Boom>::with_millis(retry_limit, timeout_ms).unwrap();
        prop_assert!(breaker.is_closed());
        prop_assert_eq!(breaker.failure_count(), 0);
        prop_assert!(!breaker.is_retry_limit_reached());
    }

    #[test]
    fn zero_values_are_rejected_independently(value in 1u32..10_000) {
        prop_assert_eq!(
            CircuitBreaker::<Boom>::with_millis(0, u64::from(value)).unwrap_err(),
            BreakerError::InvalidRetryLimit(0)
        );
        prop_assert_eq!(
            CircuitBreaker::<Boom>::with_millis(value, 0).unwrap_err(),
            BreakerError::InvalidTimeout(Duration::ZERO)
        );
    }

    #[test]
    fn opens_exactly_at_retry_limit_plus_one(retry_limit in 1u32..200) {
        let (breaker, _clock) = breaker(retry_limit, 1_000);

        for _ in 0..retry_limit {
            breaker.attempt_call(|| Err::<(), _>(Boom));
        }
        prop_assert!(breaker.is_closed());
        prop_assert_eq!(breaker.failure_count(), retry_limit);

        breaker.attempt_call(|| Err::<(), _>(Boom));
        prop_assert!(breaker.is_open());
        prop_assert_eq!(breaker.failure_count(), retry_limit + 1);
    }

    #[test]
    fn open_blocks_until_timeout_then_probes(timeout_ms in 1u64..100_000, early in 0u64..100_000) {
        let early = early % timeout_ms;
        let (breaker, clock) = breaker(3, timeout_ms);
        breaker.open();

        clock.advance(Duration::from_millis(early));
        let mut invoked = false;
        breaker.attempt_call(|| { invoked = true; Ok::<_, Boom>(()) });
        prop_assert!(!invoked);
        prop_assert_eq!(breaker.current_state(), State::Open);

        clock.advance(Duration::from_millis(timeout_ms - early));
        breaker.attempt_call(|| { invoked = true; Ok::<_, Boom>(()) });
        prop_assert!(invoked);
        prop_assert_eq!(breaker.current_state(), State::Closed);
    }

    #[test]
    fn close_always_resets(outcomes in proptest::collection::vec(any::<bool>(), 0..50)) {
        let (breaker, clock) = breaker(4, 10);
        for ok in outcomes {
            if ok {
                breaker.attempt_call(|| Ok::<_, Boom>(()));
            } else {
                breaker.attempt_call(|| Err::<(), _>(Boom));
            }
            clock.advance(Duration::from_millis(3));
        }

        breaker.close();
        prop_assert!(breaker.is_closed());
        prop_assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn last_error_tracks_only_the_latest_attempt(outcomes in proptest::collection::vec(any::<bool>(), 1..50)) {
        let (breaker, _clock) = breaker(1_000, 10);
        for ok in &outcomes {
            if *ok {
                breaker.attempt_call(|| Ok::<_, Boom>(()));
            } else {
                breaker.attempt_call(|| Err::<(), _>(Boom));
            }
        }

        let last_failed = !outcomes[outcomes.len() - 1];
        prop_assert_eq!(breaker.last_error().is_some(), last_failed);
    }
}
