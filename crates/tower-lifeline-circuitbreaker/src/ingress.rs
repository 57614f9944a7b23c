//! HTTP ingress variant of the circuit breaker.

use crate::circuit::Admission;
use crate::classifier::{FailureClassifier, StatusClassifier};
use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::layer::{CircuitBreakerHandle, CircuitBreakerLayer};
use http::header::{CONTENT_TYPE, RETRY_AFTER};
use http::{HeaderValue, Request, Response, StatusCode};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

/// Layer that puts a circuit breaker in front of an HTTP service.
///
/// Unlike [`CircuitBreakerLayer`], an open circuit is not an error: the
/// wrapped service answers `503 Service Unavailable` with a `Retry-After`
/// header and a JSON body `{"message": ..., "retryAfter": seconds}`.
///
/// ```rust
/// use tower_lifeline_circuitbreaker::HttpCircuitBreakerLayer;
/// use tower::{ServiceBuilder, service_fn};
/// use std::convert::Infallible;
///
/// let layer = HttpCircuitBreakerLayer::builder().threshold(20).build_http();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|_req: http::Request<String>| async {
///         Ok::<_, Infallible>(http::Response::new(String::from("ok")))
///     }));
/// ```
pub struct HttpCircuitBreakerLayer<C = StatusClassifier> {
    breaker: CircuitBreakerHandle<C>,
}

impl<C> Clone for HttpCircuitBreakerLayer<C> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
        }
    }
}

impl HttpCircuitBreakerLayer<StatusClassifier> {
    /// Creates a builder that treats 5xx responses and errors as failures.
    ///
    /// Finish with [`build_http`](CircuitBreakerConfigBuilder::build_http).
    pub fn builder() -> CircuitBreakerConfigBuilder<StatusClassifier> {
        CircuitBreakerConfigBuilder::http()
    }
}

impl<C> HttpCircuitBreakerLayer<C> {
    pub(crate) fn new(config: CircuitBreakerConfig<C>) -> Self {
        Self {
            breaker: CircuitBreakerLayer::new(config).handle(),
        }
    }

    /// Returns a handle for inspecting and controlling the shared breaker state.
    pub fn handle(&self) -> CircuitBreakerHandle<C> {
        self.breaker.clone()
    }
}

impl<S, C> Layer<S> for HttpCircuitBreakerLayer<C> {
    type Service = HttpCircuitBreaker<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();
        HttpCircuitBreaker {
            inner,
            breaker: self.breaker.clone(),
        }
    }
}

/// HTTP service produced by [`HttpCircuitBreakerLayer`].
pub struct HttpCircuitBreaker<S, C> {
    inner: S,
    breaker: CircuitBreakerHandle<C>,
}

impl<S, C> HttpCircuitBreaker<S, C> {
    /// Returns a handle to the shared breaker state.
    pub fn handle(&self) -> CircuitBreakerHandle<C> {
        self.breaker.clone()
    }
}

impl<S: Clone, C> Clone for HttpCircuitBreaker<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
        }
    }
}

impl<S, C, ReqBody, ResBody> Service<Request<ReqBody>> for HttpCircuitBreaker<S, C>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: From<String>,
    C: FailureClassifier<Response<ResBody>, S::Error>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, ResBody, C>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        match self.breaker.counter.try_acquire(&self.breaker.config) {
            Admission::Rejected { retry_after } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    breaker = %self.breaker.config.name,
                    method = %req.method(),
                    uri = %req.uri(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "rejecting request, circuit open"
                );
                drop(req);
                ResponseFuture {
                    kind: Kind::Rejected {
                        response: Some(rejection(
                            &self.breaker.config.rejection_message,
                            retry_after,
                        )),
                    },
                }
            }
            Admission::Permitted => ResponseFuture {
                kind: Kind::Forwarded {
                    future: self.inner.call(req),
                    breaker: self.breaker.clone(),
                },
            },
        }
    }
}

/// Builds the `503` answer given while the circuit is open.
fn rejection<B: From<String>>(message: &str, retry_after: Duration) -> Response<B> {
    let secs = crate::retry_after_secs(retry_after);
    let body = serde_json::json!({
        "message": message,
        "retryAfter": secs,
    })
    .to_string();

    let mut response = Response::new(B::from(body));
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(RETRY_AFTER, HeaderValue::from(secs));
    response
}

pin_project! {
    /// Response future for [`HttpCircuitBreaker`].
    pub struct ResponseFuture<F, B, C> {
        #[pin]
        kind: Kind<F, B, C>,
    }
}

pin_project! {
    #[project = KindProj]
    enum Kind<F, B, C> {
        Rejected {
            response: Option<Response<B>>,
        },
        Forwarded {
            #[pin]
            future: F,
            breaker: CircuitBreakerHandle<C>,
        },
    }
}

impl<F, B, E, C> Future for ResponseFuture<F, B, C>
where
    F: Future<Output = Result<Response<B>, E>>,
    C: FailureClassifier<Response<B>, E>,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().kind.project() {
            KindProj::Rejected { response } => Poll::Ready(Ok(response
                .take()
                .expect("ResponseFuture polled after completion"))),
            KindProj::Forwarded { future, breaker } => {
                let result = ready!(future.poll(cx));
                if breaker.config.failure_classifier.classify(&result) {
                    breaker.counter.record_failure(&breaker.config);
                } else {
                    breaker.counter.record_success(&breaker.config);
                }
                Poll::Ready(result)
            }
        }
    }
}
