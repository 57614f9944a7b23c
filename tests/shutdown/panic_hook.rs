use serial_test::serial;
use std::time::Duration;
use tower_lifeline_shutdown::{ShutdownCause, ShutdownCoordinator, ShutdownState};

#[tokio::test]
#[serial]
async fn task_panic_starts_the_drain() {
    let coordinator = ShutdownCoordinator::builder()
        .handle_signals(false)
        .name("panic-test")
        .build();
    coordinator.install().unwrap();

    let result = tokio::spawn(async { panic!("worker exploded") }).await;
    assert!(result.unwrap_err().is_panic());

    let cause = tokio::time::timeout(Duration::from_secs(1), coordinator.triggered())
        .await
        .unwrap();
    match cause {
        ShutdownCause::Panic(message) => assert!(message.contains("worker exploded"), "{message}"),
        other => panic!("unexpected cause {other:?}"),
    }
    assert_eq!(coordinator.state(), ShutdownState::Draining);
}

#[tokio::test]
#[serial]
async fn panics_are_ignored_when_disabled() {
    let coordinator = ShutdownCoordinator::builder()
        .handle_signals(false)
        .panics_are_fatal(false)
        .build();
    coordinator.install().unwrap();

    let result = tokio::spawn(async { panic!("tolerated") }).await;
    assert!(result.is_err());

    assert_eq!(coordinator.state(), ShutdownState::Running);
    assert!(coordinator.cause().is_none());
}

#[tokio::test]
#[serial]
async fn one_panic_reaches_every_live_coordinator() {
    let fatal = |name: &str| {
        ShutdownCoordinator::builder()
            .handle_signals(false)
            .name(name)
            .build()
    };
    for _ in 0..3 {
        fatal("dropped").install().unwrap();
    }
    let api = fatal("api");
    let worker = fatal("worker");
    api.install().unwrap();
    worker.install().unwrap();

    let result = tokio::spawn(async { panic!("shared failure") }).await;
    assert!(result.unwrap_err().is_panic());

    for coordinator in [&api, &worker] {
        let cause = tokio::time::timeout(Duration::from_secs(1), coordinator.triggered())
            .await
            .unwrap();
        assert!(matches!(cause, ShutdownCause::Panic(ref message) if message.contains("shared failure")));
        assert_eq!(coordinator.state(), ShutdownState::Draining);
    }
}
