use super::helpers::{paths, recording_sender};
use http::{Request, StatusCode};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower_lifeline_offline::{
    Connectivity, FlushReport, MemoryStore, NewJob, OfflineQueue, OfflineQueueConfig,
    OfflineQueueEvent, RetainReason,
};

#[tokio::test]
async fn failed_job_stays_queued() {
    let (sent, sender) = recording_sender("/jobs/2");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::builder().name("flush").build(),
        Arc::new(MemoryStore::new()),
        sender,
        Connectivity::offline(),
    );
    for url in ["/jobs/1", "/jobs/2", "/jobs/3"] {
        queue.enqueue(NewJob::post(url));
    }

    let report = queue.flush().await;

    assert_eq!(
        report,
        FlushReport {
            flushed: 2,
            remaining: 1,
            skipped: false
        }
    );
    assert_eq!(paths(&sent), ["/jobs/1", "/jobs/2", "/jobs/3"]);
    let pending = queue.pending_jobs();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "/jobs/2");

    // Only the retained job is replayed on the next pass.
    sent.lock().clear();
    queue.flush().await;
    assert_eq!(paths(&sent), ["/jobs/2"]);
}

#[tokio::test]
async fn empty_flush_is_idempotent() {
    let completed = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&completed);
    let (sent, sender) = recording_sender("/never");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::builder()
            .on_flush_completed(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
        Arc::new(MemoryStore::new()),
        sender,
        Connectivity::online(),
    );

    for _ in 0..3 {
        assert_eq!(queue.flush().await, FlushReport::default());
    }

    assert!(sent.lock().is_empty());
    assert_eq!(queue.queue_size(), 0);
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn queue_keeps_newest_jobs_when_full() {
    let (_sent, sender) = recording_sender("/never");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::default(),
        Arc::new(MemoryStore::new()),
        sender,
        Connectivity::offline(),
    );

    for i in 0..105 {
        queue.enqueue(NewJob::post(format!("/jobs/{i}")));
    }

    let pending = queue.pending_jobs();
    assert_eq!(pending.len(), 100);
    assert_eq!(pending[0].url, "/jobs/5");
    assert_eq!(pending[99].url, "/jobs/104");
}

#[tokio::test]
async fn replay_uses_base_url_and_json_body() {
    let (sent, sender) = recording_sender("/never");
    let queue = OfflineQueue::new(
        OfflineQueueConfig::builder()
            .base_url("https://api.example.com/")
            .build(),
        Arc::new(MemoryStore::new()),
        sender,
        Connectivity::offline(),
    );
    queue.enqueue(
        NewJob::new("/api/bookings")
            .method("put")
            .body(serde_json::json!({ "room": 12 }))
            .header("x-request-id", "abc"),
    );

    queue.flush().await;

    let sent = sent.lock();
    let request = &sent[0];
    assert_eq!(request.method(), http::Method::PUT);
    assert_eq!(
        request.uri().to_string(),
        "https://api.example.com/api/bookings"
    );
    assert_eq!(request.headers()["content-type"], "application/json");
    assert_eq!(request.headers()["x-request-id"], "abc");
    let body: serde_json::Value = serde_json::from_str(request.body()).unwrap();
    assert_eq!(body["room"], 12);
}

#[tokio::test]
async fn network_error_retains_job_and_continues() {
    let attempted = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&attempted);
    let sender = tower::service_fn(move |req: Request<String>| {
        let path = req.uri().path().to_string();
        log.lock().push(path.clone());
        async move {
            if path == "/jobs/1" {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
            } else {
                Ok(StatusCode::CREATED)
            }
        }
    });

    let retained = Arc::new(Mutex::new(Vec::new()));
    let r = Arc::clone(&retained);
    let queue = OfflineQueue::new(
        OfflineQueueConfig::builder()
            .name("network")
            .on_event(move |event| {
                if let OfflineQueueEvent::JobRetained { url, reason, .. } = event {
                    r.lock().push((url.clone(), reason.clone()));
                }
            })
            .build(),
        Arc::new(MemoryStore::new()),
        sender,
        Connectivity::offline(),
    );
    for url in ["/jobs/1", "/jobs/2"] {
        queue.enqueue(NewJob::post(url));
    }

    let report = queue.flush().await;

    assert_eq!(report.flushed, 1);
    assert_eq!(report.remaining, 1);
    assert_eq!(*attempted.lock(), ["/jobs/1", "/jobs/2"]);

    let pending = queue.pending_jobs();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "/jobs/1");

    let retained = retained.lock();
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].0, "/jobs/1");
    match &retained[0].1 {
        RetainReason::Network(message) => assert!(message.contains("connection refused")),
        other => panic!("expected a network error, got {other:?}"),
    }
}
