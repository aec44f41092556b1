use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;
use tripwire::CircuitBreaker;

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Opens on the 4th consecutive failure, probes again after 1 second
    let breaker = CircuitBreaker::<ServiceError>::new(3, Duration::from_secs(1))?;

    println!("Circuit initial state: {}", breaker.current_state());

    let mut counter = 0u32;

    for i in 1..=12 {
        println!("\nAttempt {}: ", i);

        breaker.attempt_call(|| {
            counter += 1;
            // The first 6 invocations fail, then the service recovers
            if counter <= 6 {
                Err(ServiceError("External service error".to_string()))
            } else {
                Ok(())
            }
        });

        match breaker.last_error() {
            Some(err) => println!("Call failed with error: {}", err),
            None if breaker.is_open() => println!("Circuit is open, call not attempted"),
            None => println!("Call succeeded"),
        }

        println!(
            "Current state: {}, failure count: {}",
            breaker.current_state(),
            breaker.failure_count()
        );

        thread::sleep(Duration::from_millis(300));
    }

    Ok(())
}
