use super::helpers::{paths, recording_sender, wait_for_sends};
use std::sync::Arc;
use std::time::Duration;
use tower_lifeline_offline::{Connectivity, MemoryStore, NewJob, OfflineQueue, OfflineQueueConfig};

/// A job queued while offline is sent exactly once when the client comes back.
#[tokio::test(start_paused = true)]
async fn going_online_replays_queued_job_once() {
    let connectivity = Connectivity::offline();
    let (sent, sender) = recording_sender("/never");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::default(),
        Arc::new(MemoryStore::new()),
        sender,
        connectivity.clone(),
    );
    let _triggers = queue.spawn_flush_triggers();

    queue.enqueue(NewJob::post("/api/x").body(serde_json::json!({ "a": 1 })));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sent.lock().is_empty());
    assert_eq!(queue.queue_size(), 1);

    connectivity.set_online(true);
    wait_for_sends(&sent, 1).await;

    // Let anything else that might fire run before counting.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(paths(&sent), ["/api/x"]);
    let body: serde_json::Value = serde_json::from_str(sent.lock()[0].body()).unwrap();
    assert_eq!(body, serde_json::json!({ "a": 1 }));
    assert_eq!(queue.queue_size(), 0);
}

/// Repeating the same connectivity value is not a transition.
#[tokio::test(start_paused = true)]
async fn staying_online_does_not_flush() {
    let connectivity = Connectivity::online();
    let (sent, sender) = recording_sender("/never");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::builder()
            .flush_interval(Duration::from_secs(60))
            .build(),
        Arc::new(MemoryStore::new()),
        sender,
        connectivity.clone(),
    );
    let _triggers = queue.spawn_flush_triggers();

    // The flag already says online, so the enqueue itself starts a flush.
    queue.enqueue(NewJob::post("/api/y"));
    wait_for_sends(&sent, 1).await;

    connectivity.set_online(true);
    connectivity.set_online(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sent.lock().len(), 1);
}

/// Jobs survive a failed reconnect and are picked up by the timer.
#[tokio::test(start_paused = true)]
async fn interval_retries_after_failed_reconnect() {
    let connectivity = Connectivity::offline();
    let (sent, sender) = recording_sender("/api/flaky");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::builder()
            .flush_interval(Duration::from_secs(300))
            .build(),
        Arc::new(MemoryStore::new()),
        sender,
        connectivity.clone(),
    );
    let _triggers = queue.spawn_flush_triggers();

    queue.enqueue(NewJob::post("/api/flaky"));
    connectivity.set_online(true);
    wait_for_sends(&sent, 1).await;
    assert_eq!(queue.queue_size(), 1);

    tokio::time::sleep(Duration::from_secs(300)).await;
    wait_for_sends(&sent, 2).await;
    assert_eq!(queue.queue_size(), 1);
}
