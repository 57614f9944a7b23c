//! Offline queue metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::convert::Infallible;
use std::sync::Arc;
use tower_lifeline_offline::{
    Connectivity, MemoryStore, NewJob, OfflineQueue, OfflineQueueConfig,
};

#[tokio::test]
#[serial]
async fn offline_queue_metrics_exist() {
    init_recorder();

    let queue = OfflineQueue::new(
        OfflineQueueConfig::builder().name("test_queue").build(),
        Arc::new(MemoryStore::new()),
        tower::service_fn(|req: http::Request<String>| async move {
            let status = if req.uri().path() == "/fail" {
                http::StatusCode::SERVICE_UNAVAILABLE
            } else {
                http::StatusCode::NO_CONTENT
            };
            Ok::<_, Infallible>(status)
        }),
        Connectivity::offline(),
    );

    queue.enqueue(NewJob::post("/ok"));
    queue.enqueue(NewJob::post("/fail"));
    queue.flush().await;

    let metrics = snapshot();

    assert_counter_exists(&metrics, "offline_queue_jobs_enqueued_total");
    assert_metric_has_label(&metrics, "offline_queue_jobs_enqueued_total", "queue", "test_queue");

    assert_counter_exists(&metrics, "offline_queue_jobs_flushed_total");
    assert_metric_has_label(&metrics, "offline_queue_jobs_flushed_total", "queue", "test_queue");

    assert_gauge_exists(&metrics, "offline_queue_depth");
    assert_eq!(
        gauge_value(&metrics, "offline_queue_depth", "queue", "test_queue"),
        Some(1.0)
    );
}
