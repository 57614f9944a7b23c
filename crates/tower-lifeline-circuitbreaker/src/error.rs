use std::time::Duration;
use thiserror::Error;

fn whole_secs(remaining: &Duration) -> u64 {
    crate::retry_after_secs(*remaining)
}

/// Errors returned by the [`CircuitBreaker`](crate::CircuitBreaker) service.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call never reached the inner service.
    #[error("circuit is open; retry in {}s", whole_secs(.retry_after))]
    OpenCircuit {
        /// Remaining cooldown before the breaker admits calls again.
        retry_after: Duration,
    },

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Returns the remaining cooldown if the circuit was open.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CircuitBreakerError::OpenCircuit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
