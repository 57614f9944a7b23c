use crate::classifier::{DefaultClassifier, FnClassifier, ResponseClassifier, StatusClassifier};
use crate::events::CircuitBreakerEvent;
use crate::ingress::HttpCircuitBreakerLayer;
use crate::layer::CircuitBreakerLayer;
use crate::CircuitState;
use std::time::Duration;
use tower_lifeline_core::{EventListeners, FnListener};

/// Default number of failures that opens the circuit.
pub const DEFAULT_THRESHOLD: u32 = 20;

/// Default cooldown while the circuit is open.
pub const DEFAULT_RESET_TIME: Duration = Duration::from_millis(15_000);

pub(crate) const DEFAULT_REJECTION_MESSAGE: &str =
    "Service temporarily unavailable, please retry later";

/// Configuration for the circuit breaker.
///
/// Fixed once built: every service produced by the resulting layer shares
/// this configuration and a single failure counter.
pub struct CircuitBreakerConfig<C> {
    pub(crate) threshold: u32,
    pub(crate) reset_time: Duration,
    pub(crate) failure_classifier: C,
    pub(crate) rejection_message: String,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig<DefaultClassifier> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<DefaultClassifier> {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C> CircuitBreakerConfig<C> {
    /// Failures needed to open the circuit.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// How long the circuit stays open.
    pub fn reset_time(&self) -> Duration {
        self.reset_time
    }

    /// The breaker's name, used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C> std::fmt::Debug for CircuitBreakerConfig<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("threshold", &self.threshold)
            .field("reset_time", &self.reset_time)
            .field("name", &self.name)
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder<C> {
    threshold: u32,
    reset_time: Duration,
    failure_classifier: C,
    rejection_message: String,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl Default for CircuitBreakerConfigBuilder<DefaultClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder<DefaultClassifier> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self::with_classifier(DefaultClassifier)
    }
}

impl CircuitBreakerConfigBuilder<StatusClassifier> {
    /// Creates a builder that classifies HTTP responses by status code.
    pub fn http() -> Self {
        Self::with_classifier(StatusClassifier)
    }
}

impl<C> CircuitBreakerConfigBuilder<C> {
    fn with_classifier(failure_classifier: C) -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            reset_time: DEFAULT_RESET_TIME,
            failure_classifier,
            rejection_message: DEFAULT_REJECTION_MESSAGE.to_string(),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the number of failures that opens the circuit.
    ///
    /// Values below 1 are treated as 1.
    ///
    /// Default: 20
    pub fn threshold(mut self, failures: u32) -> Self {
        self.threshold = failures.max(1);
        self
    }

    /// Sets how long the circuit stays open once tripped.
    ///
    /// Default: 15 seconds
    pub fn reset_time(mut self, duration: Duration) -> Self {
        self.reset_time = duration;
        self
    }

    /// Sets the human-readable message carried by HTTP rejections.
    pub fn rejection_message<M: Into<String>>(mut self, message: M) -> Self {
        self.rejection_message = message.into();
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Replaces the failure classifier with a closure over the whole result.
    ///
    /// ```rust
    /// use tower_lifeline_circuitbreaker::CircuitBreakerLayer;
    /// use std::io::{Error, ErrorKind};
    ///
    /// let layer = CircuitBreakerLayer::builder()
    ///     .failure_classifier(|result: &Result<String, Error>| match result {
    ///         Ok(_) => false,
    ///         Err(e) if e.kind() == ErrorKind::NotFound => false,
    ///         Err(_) => true,
    ///     })
    ///     .build();
    /// ```
    pub fn failure_classifier<F>(self, f: F) -> CircuitBreakerConfigBuilder<FnClassifier<F>> {
        self.map_classifier(FnClassifier::new(f))
    }

    /// Replaces the failure classifier with a closure over successful responses.
    /// Errors are always failures.
    pub fn classify_response<F>(self, f: F) -> CircuitBreakerConfigBuilder<ResponseClassifier<F>> {
        self.map_classifier(ResponseClassifier::new(f))
    }

    fn map_classifier<N>(self, failure_classifier: N) -> CircuitBreakerConfigBuilder<N> {
        CircuitBreakerConfigBuilder {
            threshold: self.threshold,
            reset_time: self.reset_time,
            failure_classifier,
            rejection_message: self.rejection_message,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Registers a callback for state transitions, called with `(from, to)`.
    ///
    /// ```rust
    /// use tower_lifeline_circuitbreaker::{CircuitBreakerLayer, CircuitState};
    ///
    /// let layer = CircuitBreakerLayer::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("circuit opened (was {:?})", from);
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is admitted.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected, called with the remaining cooldown.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected { retry_after, .. } = event {
                    f(*retry_after);
                }
            }));
        self
    }

    /// Registers a callback for recorded successes, called with the failure count after the credit.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { failures, .. } = event {
                    f(*failures);
                }
            }));
        self
    }

    /// Registers a callback for recorded failures, called with the failure count after the increment.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { failures, .. } = event {
                    f(*failures);
                }
            }));
        self
    }

    pub(crate) fn into_config(self) -> CircuitBreakerConfig<C> {
        CircuitBreakerConfig {
            threshold: self.threshold,
            reset_time: self.reset_time,
            failure_classifier: self.failure_classifier,
            rejection_message: self.rejection_message,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds a layer whose services return [`CircuitBreakerError::OpenCircuit`](crate::CircuitBreakerError)
    /// while the circuit is open.
    pub fn build(self) -> CircuitBreakerLayer<C> {
        CircuitBreakerLayer::new(self.into_config())
    }

    /// Builds an HTTP ingress layer that answers with `503 Service Unavailable`
    /// while the circuit is open.
    pub fn build_http(self) -> HttpCircuitBreakerLayer<C> {
        HttpCircuitBreakerLayer::new(self.into_config())
    }
}
