use http::header::RETRY_AFTER;
use http::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt, service_fn};
use tower_lifeline_circuitbreaker::HttpCircuitBreakerLayer;

type Handler = BoxCloneService<Request<String>, Response<String>, Infallible>;

fn counting_handler(status: StatusCode, hits: Arc<AtomicUsize>) -> Handler {
    service_fn(move |_req: Request<String>| {
        hits.fetch_add(1, Ordering::SeqCst);
        async move {
            let mut response = Response::new(String::from("handled"));
            *response.status_mut() = status;
            Ok::<_, Infallible>(response)
        }
    })
    .boxed_clone()
}

fn request() -> Request<String> {
    Request::builder()
        .uri("/api/orders")
        .body(String::new())
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn open_circuit_answers_503_with_retry_after() {
    let hits = Arc::new(AtomicUsize::new(0));
    let layer = HttpCircuitBreakerLayer::builder()
        .threshold(3)
        .reset_time(Duration::from_secs(15))
        .rejection_message("orders are unavailable")
        .build_http();
    let mut service = layer.layer(counting_handler(
        StatusCode::INTERNAL_SERVER_ERROR,
        Arc::clone(&hits),
    ));

    for _ in 0..3 {
        let response = service.ready().await.unwrap().call(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    tokio::time::advance(Duration::from_millis(4_500)).await;

    let response = service.ready().await.unwrap().call(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[RETRY_AFTER], "11");

    let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
    assert_eq!(body["message"], "orders are unavailable");
    assert_eq!(body["retryAfter"], 11);

    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn handler_is_not_invoked_while_open() {
    let hits = Arc::new(AtomicUsize::new(0));
    let layer = HttpCircuitBreakerLayer::builder().threshold(1).build_http();
    let handle = layer.handle();
    let mut service = layer.layer(counting_handler(
        StatusCode::BAD_GATEWAY,
        Arc::clone(&hits),
    ));

    let _ = service.ready().await.unwrap().call(request()).await;
    assert!(handle.is_open());

    for _ in 0..10 {
        let response = service.ready().await.unwrap().call(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
        assert!(body["retryAfter"].as_u64().unwrap() > 0);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn client_errors_never_open_the_circuit() {
    let hits = Arc::new(AtomicUsize::new(0));
    let layer = HttpCircuitBreakerLayer::builder().threshold(2).build_http();
    let service = layer.layer(counting_handler(StatusCode::NOT_FOUND, Arc::clone(&hits)));

    for _ in 0..20 {
        let response = service.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    assert!(!layer.handle().is_open());
    assert_eq!(hits.load(Ordering::SeqCst), 20);
}

#[tokio::test(start_paused = true)]
async fn default_settings_open_after_twenty_failures() {
    let hits = Arc::new(AtomicUsize::new(0));
    let layer = HttpCircuitBreakerLayer::builder().build_http();
    let service = layer.layer(counting_handler(
        StatusCode::SERVICE_UNAVAILABLE,
        Arc::clone(&hits),
    ));

    for _ in 0..20 {
        let _ = service.clone().oneshot(request()).await;
    }
    let response = service.clone().oneshot(request()).await.unwrap();

    assert_eq!(response.headers()[RETRY_AFTER], "15");
    assert_eq!(hits.load(Ordering::SeqCst), 20);
}
