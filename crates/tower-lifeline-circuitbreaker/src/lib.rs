//! Failure-count circuit breaker for Tower services.
//!
//! The breaker counts failed calls. When the count reaches the configured
//! threshold the circuit opens: every call is rejected immediately, without
//! reaching the inner service, until the reset time has elapsed. Successful
//! calls credit one failure back, so a service that mostly works never trips.
//!
//! ## States
//! - **Closed**: calls pass through and their outcomes are counted
//! - **Open**: calls are rejected with the remaining cooldown as a retry hint
//!
//! There is no half-open probing state. The first call after the cooldown is
//! forwarded as usual and counting restarts from zero.
//!
//! ## Generic services
//!
//! ```rust
//! use tower_lifeline_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer};
//! use tower::{Layer, Service, ServiceExt, service_fn};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let layer = CircuitBreakerLayer::builder()
//!     .threshold(3)
//!     .reset_time(Duration::from_secs(15))
//!     .name("inventory")
//!     .build();
//!
//! let mut service = layer.layer(service_fn(|_req: ()| async {
//!     Err::<(), _>("backend down")
//! }));
//!
//! for _ in 0..3 {
//!     let _ = service.ready().await.unwrap().call(()).await;
//! }
//!
//! match service.ready().await.unwrap().call(()).await {
//!     Err(CircuitBreakerError::OpenCircuit { retry_after }) => {
//!         assert!(retry_after > Duration::ZERO);
//!     }
//!     other => panic!("expected rejection, got {:?}", other),
//! }
//! # }
//! ```
//!
//! ## HTTP ingress
//!
//! [`HttpCircuitBreakerLayer`] wraps an HTTP service (for example an axum
//! `Router`). 5xx responses count as failures; while open it answers with
//! `503 Service Unavailable`, a `Retry-After` header and a JSON body of the
//! form `{"message": "...", "retryAfter": 12}`.
//!
//! ```rust
//! use tower_lifeline_circuitbreaker::HttpCircuitBreakerLayer;
//! use std::time::Duration;
//!
//! let layer = HttpCircuitBreakerLayer::builder()
//!     .threshold(20)
//!     .reset_time(Duration::from_secs(15))
//!     .build_http();
//! ```
//!
//! ## Event Listeners
//!
//! ```rust
//! use tower_lifeline_circuitbreaker::CircuitBreakerLayer;
//!
//! let layer = CircuitBreakerLayer::builder()
//!     .on_state_transition(|from, to| println!("circuit: {:?} -> {:?}", from, to))
//!     .on_call_rejected(|retry_after| println!("rejected, retry in {:?}", retry_after))
//!     .build();
//! ```
//!
//! ## Feature Flags
//! - `metrics`: call outcomes, transitions and the failure gauge via the `metrics` crate
//! - `tracing`: admission and transition logging via `tracing`

use crate::circuit::Admission;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

pub use circuit::{CircuitMetrics, CircuitState, FailureCounter};
pub use classifier::{
    DefaultClassifier, FailureClassifier, FnClassifier, ResponseClassifier, StatusClassifier,
};
pub use config::{
    CircuitBreakerConfig, CircuitBreakerConfigBuilder, DEFAULT_RESET_TIME, DEFAULT_THRESHOLD,
};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use ingress::{HttpCircuitBreaker, HttpCircuitBreakerLayer, ResponseFuture};
pub use layer::{CircuitBreakerHandle, CircuitBreakerLayer};

mod circuit;
pub mod classifier;
mod config;
mod error;
mod events;
mod ingress;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls through the circuit breaker"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_failures",
            "Failures currently counted toward the threshold"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0 closed, 1 open)"
        );
    });
}

/// Rounds a remaining cooldown up to whole seconds, never below one.
pub fn retry_after_secs(remaining: Duration) -> u64 {
    let millis = remaining.as_millis() as u64;
    millis.div_ceil(1000).max(1)
}

/// A Tower Service that applies circuit breaker logic to an inner service.
///
/// While the circuit is open, calls fail with
/// [`CircuitBreakerError::OpenCircuit`] and the inner service is not called.
pub struct CircuitBreaker<S, C> {
    inner: S,
    breaker: CircuitBreakerHandle<C>,
}

impl<S, C> CircuitBreaker<S, C> {
    pub(crate) fn new(inner: S, breaker: CircuitBreakerHandle<C>) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics();
        Self { inner, breaker }
    }

    /// Returns a handle to the shared breaker state.
    pub fn handle(&self) -> CircuitBreakerHandle<C> {
        self.breaker.clone()
    }

    /// Returns the current state of the circuit.
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Returns a snapshot of the breaker's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.breaker.metrics()
    }
}

impl<S, C> Clone for CircuitBreaker<S, C>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
        }
    }
}

impl<S, C, Req> Service<Req> for CircuitBreaker<S, C>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    C: FailureClassifier<S::Response, S::Error> + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = self.breaker.clone();

        #[cfg(feature = "tracing")]
        tracing::trace!(breaker = %breaker.config.name, "checking circuit breaker admission");

        if let Admission::Rejected { retry_after } = breaker.counter.try_acquire(&breaker.config)
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                breaker = %breaker.config.name,
                retry_after_ms = retry_after.as_millis() as u64,
                "circuit breaker rejected call (circuit open)"
            );
            return Box::pin(async move { Err(CircuitBreakerError::OpenCircuit { retry_after }) });
        }

        // The clone in `self` is not necessarily ready; the ready one is used
        // for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(req).await;

            if breaker.config.failure_classifier.classify(&result) {
                breaker.counter.record_failure(&breaker.config);
            } else {
                breaker.counter.record_success(&breaker.config);
            }

            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
