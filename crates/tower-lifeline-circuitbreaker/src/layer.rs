use crate::circuit::{CircuitMetrics, CircuitState, FailureCounter};
use crate::classifier::{DefaultClassifier, StatusClassifier};
use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::CircuitBreaker;
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;

/// A Tower Layer that applies circuit breaker behavior to an inner service.
///
/// The layer owns the failure counter. Every service it produces, and every
/// clone of the layer, shares that one counter, so applying the layer to
/// several routes still yields a single process-wide breaker.
///
/// ```rust
/// use tower::{ServiceBuilder, service_fn};
/// use tower_lifeline_circuitbreaker::CircuitBreakerLayer;
/// use std::time::Duration;
///
/// let layer = CircuitBreakerLayer::builder()
///     .threshold(20)
///     .reset_time(Duration::from_secs(15))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
pub struct CircuitBreakerLayer<C = DefaultClassifier> {
    pub(crate) config: Arc<CircuitBreakerConfig<C>>,
    pub(crate) counter: Arc<FailureCounter>,
}

impl<C> Clone for CircuitBreakerLayer<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            counter: Arc::clone(&self.counter),
        }
    }
}

impl<C> CircuitBreakerLayer<C> {
    pub(crate) fn new(config: CircuitBreakerConfig<C>) -> Self {
        Self {
            config: Arc::new(config),
            counter: Arc::new(FailureCounter::new()),
        }
    }

    /// Returns a handle for inspecting and controlling the shared breaker state.
    pub fn handle(&self) -> CircuitBreakerHandle<C> {
        CircuitBreakerHandle {
            config: Arc::clone(&self.config),
            counter: Arc::clone(&self.counter),
        }
    }
}

impl CircuitBreakerLayer<DefaultClassifier> {
    /// Creates a new builder for configuring a circuit breaker layer.
    pub fn builder() -> CircuitBreakerConfigBuilder<DefaultClassifier> {
        CircuitBreakerConfigBuilder::new()
    }
}

impl CircuitBreakerLayer<StatusClassifier> {
    /// Creates a builder that treats 5xx responses and errors as failures.
    pub fn http_builder() -> CircuitBreakerConfigBuilder<StatusClassifier> {
        CircuitBreakerConfigBuilder::http()
    }
}

impl<S, C> Layer<S> for CircuitBreakerLayer<C> {
    type Service = CircuitBreaker<S, C>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, self.handle())
    }
}

/// Shared view of a breaker's configuration and failure counter.
///
/// Cloning the handle is cheap; all clones observe the same state.
pub struct CircuitBreakerHandle<C> {
    pub(crate) config: Arc<CircuitBreakerConfig<C>>,
    pub(crate) counter: Arc<FailureCounter>,
}

impl<C> Clone for CircuitBreakerHandle<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            counter: Arc::clone(&self.counter),
        }
    }
}

impl<C> CircuitBreakerHandle<C> {
    /// Returns the current state of the circuit.
    pub fn state(&self) -> CircuitState {
        self.counter.state()
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns the number of failures currently counted.
    pub fn failures(&self) -> u32 {
        self.counter.failures()
    }

    /// Returns the remaining cooldown, or `None` if the circuit is closed.
    pub fn retry_after(&self) -> Option<Duration> {
        self.counter.retry_after()
    }

    /// Returns a snapshot of the breaker's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.counter.metrics()
    }

    /// Opens the circuit for one reset period.
    pub fn force_open(&self) {
        self.counter.force_open(&self.config);
    }

    /// Closes the circuit and clears the failure count.
    pub fn reset(&self) {
        self.counter.reset(&self.config);
    }

    /// Returns the breaker's configuration.
    pub fn config(&self) -> &CircuitBreakerConfig<C> {
        &self.config
    }

    /// Returns an HTTP status suitable for a readiness probe: 200 when
    /// closed, 503 when open.
    pub fn http_status(&self) -> u16 {
        match self.state() {
            CircuitState::Closed => 200,
            CircuitState::Open => 503,
        }
    }
}

impl<C> std::fmt::Debug for CircuitBreakerHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerHandle")
            .field("name", &self.config.name)
            .field("metrics", &self.counter.metrics())
            .finish()
    }
}
