use super::helpers::{paths, recording_sender};
use std::sync::Arc;
use tower_lifeline_offline::{
    Connectivity, FileStore, JobStore, NewJob, OfflineQueue, OfflineQueueConfig,
};

/// Jobs written by one queue instance are replayed by the next one.
#[tokio::test]
async fn jobs_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let (_sent, sender) = recording_sender("/never");
        let queue = OfflineQueue::new(
            OfflineQueueConfig::default(),
            Arc::new(FileStore::open(dir.path()).unwrap()),
            sender,
            Connectivity::offline(),
        );
        queue.enqueue(NewJob::post("/api/first"));
        queue.enqueue(NewJob::new("/api/second").method("DELETE"));
    }

    let store = FileStore::open(dir.path()).unwrap();
    let raw = store.get("offline_queue").unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored[0]["url"], "/api/first");
    assert_eq!(stored[1]["method"], "DELETE");
    assert!(stored[0]["timestamp"].as_u64().unwrap() > 0);

    let (sent, sender) = recording_sender("/never");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::default(),
        Arc::new(store),
        sender,
        Connectivity::offline(),
    );
    assert_eq!(queue.queue_size(), 2);

    let report = queue.flush().await;
    assert_eq!(report.flushed, 2);
    assert_eq!(paths(&sent), ["/api/first", "/api/second"]);
    assert_eq!(queue.queue_size(), 0);
}

/// Separate storage keys are separate queues in the same directory.
#[tokio::test]
async fn storage_keys_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());

    let (_sent, sender) = recording_sender("/never");
    let bookings = OfflineQueue::new(
        OfflineQueueConfig::builder().storage_key("bookings").build(),
        store.clone(),
        sender.clone(),
        Connectivity::offline(),
    );
    let payments = OfflineQueue::new(
        OfflineQueueConfig::builder().storage_key("payments").build(),
        store,
        sender,
        Connectivity::offline(),
    );

    bookings.enqueue(NewJob::post("/bookings"));
    bookings.enqueue(NewJob::post("/bookings"));
    payments.enqueue(NewJob::post("/payments"));

    assert_eq!(bookings.queue_size(), 2);
    assert_eq!(payments.queue_size(), 1);

    bookings.clear_queue();
    assert_eq!(bookings.queue_size(), 0);
    assert_eq!(payments.queue_size(), 1);
    assert!(dir.path().join("payments.json").exists());
    assert!(!dir.path().join("bookings.json").exists());
}

/// A corrupt file reads as an empty queue and is replaced on the next write.
#[tokio::test]
async fn corrupt_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("offline_queue.json"), "{not json").unwrap();

    let (_sent, sender) = recording_sender("/never");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::default(),
        Arc::new(FileStore::open(dir.path()).unwrap()),
        sender,
        Connectivity::offline(),
    );
    assert_eq!(queue.queue_size(), 0);

    queue.enqueue(NewJob::post("/api/fresh"));
    assert_eq!(queue.pending_jobs()[0].url, "/api/fresh");
}
