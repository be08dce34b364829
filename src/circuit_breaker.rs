use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Consecutive failed completions that open the circuit.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Breaker shared by every pipeline calling the completion API.
///
/// Clones share state.
pub type AiCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates the circuit breaker guarding the completion API.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures trigger the OPEN state.
/// - **Backoff**: exponential from 30s to 5min before a trial call is let through.
///
/// While open, calls are rejected immediately and the normalizer reports the
/// AI stage as unavailable without waiting for a timeout.
pub fn create_ai_circuit_breaker() -> AiCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(30),  // Initial delay
        Duration::from_secs(300), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(FAILURE_THRESHOLD, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
