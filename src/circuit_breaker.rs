use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Breaker guarding calls to the remote scoring service.
pub type ScoringBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates the circuit breaker shared by every remote scoring call.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// While open, scoring calls are rejected without touching the network and the
/// caller falls back to the local rule-based scorer.
///
/// # Example
///
/// ```rust
/// use rust_leadconnect::circuit_breaker::create_scoring_circuit_breaker;
///
/// let breaker = create_scoring_circuit_breaker();
/// assert!(breaker.is_call_permitted());
/// ```
pub fn create_scoring_circuit_breaker() -> ScoringBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
