use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower_lifeline_shutdown::{ShutdownCause, ShutdownCoordinator, ShutdownOutcome};

#[tokio::test(start_paused = true)]
async fn later_triggers_are_ignored() {
    let started = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&started);
    let coordinator = ShutdownCoordinator::builder()
        .handle_signals(false)
        .panics_are_fatal(false)
        .on_drain_started(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    assert!(coordinator.trigger(ShutdownCause::Terminate));
    assert!(!coordinator.trigger(ShutdownCause::Interrupt));
    assert!(!coordinator.report_fatal("late"));

    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.cause(), Some(ShutdownCause::Terminate));
    assert_eq!(coordinator.triggered().await, ShutdownCause::Terminate);
}

/// A second trigger halfway through the drain does not extend the deadline.
#[tokio::test(start_paused = true)]
async fn deadline_is_fixed_at_first_trigger() {
    let coordinator = ShutdownCoordinator::builder()
        .handle_signals(false)
        .panics_are_fatal(false)
        .build();

    let runner = coordinator.clone();
    let server = tokio::spawn(async move {
        runner
            .run(async {
                std::future::pending::<()>().await;
                Ok::<_, std::io::Error>(())
            })
            .await
    });
    tokio::task::yield_now().await;

    let start = tokio::time::Instant::now();
    coordinator.trigger(ShutdownCause::Interrupt);
    tokio::time::sleep(Duration::from_secs(5)).await;
    coordinator.trigger(ShutdownCause::Interrupt);

    let outcome = server.await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(start.elapsed() < Duration::from_secs(11));
    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(outcome, ShutdownOutcome::DeadlineExceeded { .. }));
}

#[tokio::test(start_paused = true)]
async fn server_error_without_trigger_is_reported() {
    let coordinator = ShutdownCoordinator::builder()
        .handle_signals(false)
        .panics_are_fatal(false)
        .build();

    let outcome = coordinator
        .run(async { Err::<(), _>(std::io::Error::other("address in use")) })
        .await;

    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(outcome, ShutdownOutcome::ServerError { ref message, .. } if message.contains("address in use")));
}
