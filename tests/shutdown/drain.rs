use super::helpers::{get, serve};
use axum::Router;
use axum::routing::get as route_get;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower_lifeline_shutdown::{ShutdownCause, ShutdownCoordinator, ShutdownOutcome, ShutdownState};

fn slow_app(started: Arc<Notify>, delay: Duration) -> Router {
    Router::new()
        .route(
            "/slow",
            route_get(move || {
                let started = Arc::clone(&started);
                async move {
                    started.notify_one();
                    tokio::time::sleep(delay).await;
                    "done"
                }
            }),
        )
        .route("/fast", route_get(|| async { "fast" }))
}

fn coordinator(drain_timeout: Duration) -> ShutdownCoordinator {
    ShutdownCoordinator::builder()
        .drain_timeout(drain_timeout)
        .handle_signals(false)
        .panics_are_fatal(false)
        .name("drain-test")
        .build()
}

#[tokio::test]
async fn in_flight_request_completes_and_exit_is_clean() {
    let started = Arc::new(Notify::new());
    let coordinator = coordinator(Duration::from_secs(5));
    let (addr, server) = serve(
        slow_app(Arc::clone(&started), Duration::from_millis(300)),
        &coordinator,
    )
    .await;

    let client = tokio::spawn(async move { get(addr, "/slow").await });
    started.notified().await;

    assert!(coordinator.trigger(ShutdownCause::Interrupt));
    assert_eq!(coordinator.state(), ShutdownState::Draining);

    let response = client.await.unwrap().unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("done"), "{response}");

    let outcome = server.await.unwrap();
    assert!(matches!(
        outcome,
        ShutdownOutcome::Drained {
            cause: Some(ShutdownCause::Interrupt),
            ..
        }
    ));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(coordinator.state(), ShutdownState::Terminated);
}

#[tokio::test]
async fn new_connections_are_refused_while_draining() {
    let started = Arc::new(Notify::new());
    let coordinator = coordinator(Duration::from_secs(5));
    let (addr, server) = serve(
        slow_app(Arc::clone(&started), Duration::from_millis(500)),
        &coordinator,
    )
    .await;

    assert!(get(addr, "/fast").await.unwrap().ends_with("fast"));

    let in_flight = tokio::spawn(async move { get(addr, "/slow").await });
    started.notified().await;
    coordinator.trigger(ShutdownCause::Terminate);

    // The listener is closed as soon as the server sees the drain.
    let refused = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if get(addr, "/fast").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(refused.is_ok(), "server kept accepting connections");

    assert!(in_flight.await.unwrap().unwrap().ends_with("done"));
    assert_eq!(server.await.unwrap().exit_code(), 0);
}

#[tokio::test]
async fn slow_request_hits_the_deadline() {
    let started = Arc::new(Notify::new());
    let coordinator = ShutdownCoordinator::builder()
        .drain_timeout(Duration::from_millis(200))
        .forced_exit_code(3)
        .handle_signals(false)
        .panics_are_fatal(false)
        .build();
    let (addr, server) = serve(
        slow_app(Arc::clone(&started), Duration::from_secs(60)),
        &coordinator,
    )
    .await;

    let _client = tokio::spawn(async move { get(addr, "/slow").await });
    started.notified().await;

    let triggered = tokio::time::Instant::now();
    coordinator.trigger(ShutdownCause::Interrupt);
    let outcome = server.await.unwrap();

    assert!(triggered.elapsed() >= Duration::from_millis(200));
    assert!(triggered.elapsed() < Duration::from_secs(5));
    assert_eq!(
        outcome,
        ShutdownOutcome::DeadlineExceeded {
            cause: Some(ShutdownCause::Interrupt),
            timeout: Duration::from_millis(200),
            exit_code: 3,
        }
    );
    assert_ne!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn idle_server_drains_immediately() {
    let coordinator = coordinator(Duration::from_secs(10));
    let (_addr, server) = serve(Router::new(), &coordinator).await;

    coordinator.report_fatal("database pool poisoned");
    let outcome = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("drain took too long")
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.cause().unwrap().is_fatal());
}
