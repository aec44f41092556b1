//! Advanced Circuit Breaker Example
//!
//! This example demonstrates:
//! 1. Building a breaker with a name, hooks and a deterministic clock
//! 2. Using `call` to get the operation's value back
//! 3. Manual overrides with `try_close` / `open`

use std::error::Error;
use std::fmt;
use std::time::Duration;
use tripwire::{CallError, CircuitBreaker, HookRegistry, ManualClock};

#[derive(Debug)]
struct ServiceError(String);

impl ServiceError {
    fn new(msg: &str) -> Self {
        ServiceError(msg.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// A function that simulates an external service with varying failure patterns
fn external_service_call(calls: &mut u32) -> Result<String, ServiceError> {
    *calls += 1;

    if *calls <= 2 {
        Ok("Initial success".to_string())
    } else if *calls <= 5 {
        Err(ServiceError::new("Service temporarily unavailable"))
    } else {
        Ok("Service recovered".to_string())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== Advanced Circuit Breaker Example ===\n");

    let hooks = HookRegistry::new();
    hooks.on_transition(|t| println!("  circuit moved {} -> {}", t.from, t.to));
    hooks.set_on_failure(|e| println!("  failure recorded: {}", e));
    hooks.set_on_rejected(|| println!("  attempt skipped, circuit open"));

    let clock = ManualClock::new();
    let breaker = CircuitBreaker::<ServiceError>::builder()
        .name("inventory")
        .retry_limit(2)
        .timeout(Duration::from_secs(2))
        .clock(clock.clone())
        .hooks(hooks)
        .build()?;

    let mut calls = 0;

    for i in 1..=10 {
        println!("\n--- Call {} ---", i);

        match breaker.call(|| external_service_call(&mut calls)) {
            Ok(response) => println!("Service response: {}", response),
            Err(CallError::Open) => println!("Circuit open, call not attempted"),
            Err(CallError::Operation(err)) => println!("Service error: {}", err),
        }

        println!("{:?}", breaker);

        // half a cooldown passes between calls
        clock.advance(Duration::from_secs(1));
    }

    println!("\nManual override");
    breaker.open();
    println!("try_close from open -> closed? {}", breaker.try_close());
    println!("try_close from half-open -> closed? {}", breaker.try_close());
    println!("stats: {:?}", breaker.stats());

    println!("\n=== Example Completed ===");
    Ok(())
}
