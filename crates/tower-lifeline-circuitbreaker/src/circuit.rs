use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
///
/// There is no half-open state: once the cooldown elapses the circuit is
/// closed again and the next call is forwarded like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed,
    /// The circuit is open and calls are rejected.
    Open,
}

impl CircuitState {
    #[cfg(any(feature = "metrics", feature = "tracing"))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
        }
    }
}

/// Snapshot of the failure counter for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    /// Current state of the circuit breaker.
    pub state: CircuitState,
    /// Failures counted since the circuit last opened or closed.
    pub failures: u32,
    /// Remaining cooldown while open.
    pub retry_after: Option<Duration>,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Permitted,
    Rejected { retry_after: Duration },
}

#[derive(Debug)]
struct CounterState {
    state: CircuitState,
    failures: u32,
    open_until: Option<Instant>,
}

/// The failure counter shared by every service a breaker layer produces.
///
/// `failures` and `open_until` live behind one lock so the
/// read-compare-open sequence is a single critical section: two concurrent
/// failures can never both open the circuit and double-reset the count.
#[derive(Debug)]
pub struct FailureCounter {
    inner: Mutex<CounterState>,
}

impl Default for FailureCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureCounter {
    /// Creates a closed counter with no recorded failures.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CounterState {
                state: CircuitState::Closed,
                failures: 0,
                open_until: None,
            }),
        }
    }

    /// Returns the current state, taking an elapsed cooldown into account.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match inner.open_until {
            Some(until) if Instant::now() < until => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }

    /// Returns the number of failures currently counted.
    pub fn failures(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Returns the remaining cooldown, or `None` if the circuit is closed.
    pub fn retry_after(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        let now = Instant::now();
        inner
            .open_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Returns a consistent snapshot of the counter.
    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock();
        let now = Instant::now();
        let retry_after = inner
            .open_until
            .filter(|until| now < *until)
            .map(|until| until - now);
        CircuitMetrics {
            state: if retry_after.is_some() {
                CircuitState::Open
            } else {
                CircuitState::Closed
            },
            failures: inner.failures,
            retry_after,
        }
    }

    /// Decides whether a call may proceed.
    ///
    /// The first check after the cooldown elapses closes the circuit and
    /// restarts counting from zero.
    pub(crate) fn try_acquire<C>(&self, config: &CircuitBreakerConfig<C>) -> Admission {
        let now = Instant::now();
        let (admission, transition) = {
            let mut inner = self.inner.lock();
            match inner.open_until {
                Some(until) if now < until => (
                    Admission::Rejected {
                        retry_after: until - now,
                    },
                    None,
                ),
                Some(_) => {
                    inner.open_until = None;
                    inner.failures = 0;
                    let from = std::mem::replace(&mut inner.state, CircuitState::Closed);
                    (Admission::Permitted, Some(from))
                }
                None => (Admission::Permitted, None),
            }
        };

        if let Some(from) = transition {
            self.transitioned(config, from, CircuitState::Closed);
        }

        match admission {
            Admission::Permitted => {
                config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallPermitted {
                        source: config.name.clone(),
                        timestamp: std::time::Instant::now(),
                        state: CircuitState::Closed,
                    });
            }
            Admission::Rejected { retry_after } => {
                config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallRejected {
                        source: config.name.clone(),
                        timestamp: std::time::Instant::now(),
                        retry_after,
                    });

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
            }
        }

        admission
    }

    /// Records a failed call. Reaching the threshold opens the circuit for
    /// the configured reset time and zeroes the counter.
    pub(crate) fn record_failure<C>(&self, config: &CircuitBreakerConfig<C>) {
        let (failures, transition) = {
            let mut inner = self.inner.lock();
            inner.failures = inner.failures.saturating_add(1);
            if inner.failures >= config.threshold {
                inner.failures = 0;
                inner.open_until = Some(Instant::now() + config.reset_time);
                let from = std::mem::replace(&mut inner.state, CircuitState::Open);
                (0, Some(from))
            } else {
                (inner.failures, None)
            }
        };

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                source: config.name.clone(),
                timestamp: std::time::Instant::now(),
                failures,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);
            gauge!("circuitbreaker_failures", "circuitbreaker" => config.name.clone())
                .set(failures as f64);
        }

        match transition {
            Some(CircuitState::Closed) => {
                self.transitioned(config, CircuitState::Closed, CircuitState::Open)
            }
            Some(CircuitState::Open) => {
                // A call admitted before the circuit opened failed late and
                // pushed the count over again; the cooldown restarts.
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %config.name, "open circuit cooldown extended");
            }
            None => {}
        }
    }

    /// Records a successful call, crediting one failure back (never below zero).
    pub(crate) fn record_success<C>(&self, config: &CircuitBreakerConfig<C>) {
        let failures = {
            let mut inner = self.inner.lock();
            inner.failures = inner.failures.saturating_sub(1);
            inner.failures
        };

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                source: config.name.clone(),
                timestamp: std::time::Instant::now(),
                failures,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);
            gauge!("circuitbreaker_failures", "circuitbreaker" => config.name.clone())
                .set(failures as f64);
        }
    }

    /// Opens the circuit for one reset period regardless of the count.
    pub(crate) fn force_open<C>(&self, config: &CircuitBreakerConfig<C>) {
        let from = {
            let mut inner = self.inner.lock();
            inner.failures = 0;
            inner.open_until = Some(Instant::now() + config.reset_time);
            std::mem::replace(&mut inner.state, CircuitState::Open)
        };
        self.transitioned(config, from, CircuitState::Open);
    }

    /// Closes the circuit and clears the count.
    pub(crate) fn reset<C>(&self, config: &CircuitBreakerConfig<C>) {
        let from = {
            let mut inner = self.inner.lock();
            inner.failures = 0;
            inner.open_until = None;
            std::mem::replace(&mut inner.state, CircuitState::Closed)
        };
        self.transitioned(config, from, CircuitState::Closed);
    }

    fn transitioned<C>(
        &self,
        config: &CircuitBreakerConfig<C>,
        from_state: CircuitState,
        to_state: CircuitState,
    ) {
        if from_state == to_state {
            return;
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                source: config.name.clone(),
                timestamp: std::time::Instant::now(),
                from_state,
                to_state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from_state.as_str(),
            to = to_state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => to_state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(match to_state {
                    CircuitState::Closed => 0.0,
                    CircuitState::Open => 1.0,
                });
        }
    }
}
