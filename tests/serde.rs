#![cfg(feature = "serde")]

use std::time::Duration;

use tripwire::{BreakerConfig, CallStats, CircuitBreaker, State};

#[test]
fn config_deserializes_and_builds() {
    let config: BreakerConfig =
        serde_json::from_str(r#"{"retry_limit":3,"timeout":{"secs":2,"nanos":0}}"#).unwrap();
    assert_eq!(config, BreakerConfig::new(3, Duration::from_secs(2)));

    let breaker = CircuitBreaker::<std::io::Error>::from_config(config).unwrap();
    assert_eq!(breaker.retry_limit(), 3);
}

#[test]
fn state_and_stats_serialize() {
    assert_eq!(serde_json::to_string(&State::HalfOpen).unwrap(), r#""half-open""#);

    let stats = CallStats {
        calls: 4,
        successes: 3,
        failures: 1,
        rejections: 2,
    };
    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["rejections"], 2);
}
