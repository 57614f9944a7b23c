//! Failure classification for circuit breaker decisions.
//!
//! Every completed call is either a failure (the counter goes up) or a
//! success (the counter is credited by one, floored at zero).

use std::sync::Arc;

/// Trait for classifying whether a result represents a failure.
pub trait FailureClassifier<Res, Err>: Send + Sync {
    /// Returns `true` if the result should count toward opening the circuit.
    fn classify(&self, result: &Result<Res, Err>) -> bool;
}

/// Treats every `Err` as a failure and every `Ok` as a success.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<Res, Err> FailureClassifier<Res, Err> for DefaultClassifier {
    fn classify(&self, result: &Result<Res, Err>) -> bool {
        result.is_err()
    }
}

/// Classifies HTTP responses by status code.
///
/// - `Ok(response)` with a 5xx status => failure
/// - `Ok(response)` with any other status => success
/// - `Err(_)` => failure
///
/// ```rust
/// use tower_lifeline_circuitbreaker::classifier::{FailureClassifier, StatusClassifier};
///
/// let ok = http::Response::builder().status(404).body(()).unwrap();
/// let bad = http::Response::builder().status(502).body(()).unwrap();
///
/// assert!(!FailureClassifier::<_, ()>::classify(&StatusClassifier, &Ok(ok)));
/// assert!(FailureClassifier::<_, ()>::classify(&StatusClassifier, &Ok(bad)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusClassifier;

impl<B, Err> FailureClassifier<http::Response<B>, Err> for StatusClassifier {
    fn classify(&self, result: &Result<http::Response<B>, Err>) -> bool {
        match result {
            Ok(response) => response.status().is_server_error(),
            Err(_) => true,
        }
    }
}

/// A failure classifier backed by a closure over the whole result.
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Creates a new `FnClassifier` from the given closure.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Res, Err> FailureClassifier<Res, Err> for FnClassifier<F>
where
    F: Fn(&Result<Res, Err>) -> bool + Send + Sync,
{
    fn classify(&self, result: &Result<Res, Err>) -> bool {
        (self.f)(result)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}

/// A classifier that only inspects successful responses; errors are always failures.
///
/// Useful for services whose error type is `Infallible` and which encode
/// failures in the response itself.
#[derive(Clone)]
pub struct ResponseClassifier<F> {
    f: Arc<F>,
}

impl<F> ResponseClassifier<F> {
    /// Creates a new `ResponseClassifier` from the given closure.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Res, Err> FailureClassifier<Res, Err> for ResponseClassifier<F>
where
    F: Fn(&Res) -> bool + Send + Sync,
{
    fn classify(&self, result: &Result<Res, Err>) -> bool {
        match result {
            Ok(response) => (self.f)(response),
            Err(_) => true,
        }
    }
}

impl<F> std::fmt::Debug for ResponseClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}
