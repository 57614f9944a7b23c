//! Circuit breaker metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};
use tower_lifeline_circuitbreaker::CircuitBreakerLayer;

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let layer = CircuitBreakerLayer::builder()
        .name("test_cb")
        .threshold(2)
        .reset_time(Duration::from_secs(60))
        .build();
    let mut service = layer.layer(tower::service_fn(|fail: bool| async move {
        if fail { Err("failure") } else { Ok("success") }
    }));

    for fail in [false, true, true, false] {
        let _ = service.ready().await.unwrap().call(fail).await;
    }

    let metrics = snapshot();

    assert_counter_exists(&metrics, "circuitbreaker_calls_total");
    assert_metric_has_label(&metrics, "circuitbreaker_calls_total", "circuitbreaker", "test_cb");
    assert_metric_has_label(&metrics, "circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label(&metrics, "circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label(&metrics, "circuitbreaker_calls_total", "outcome", "rejected");

    assert_counter_exists(&metrics, "circuitbreaker_transitions_total");
    assert_metric_has_label(&metrics, "circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label(&metrics, "circuitbreaker_transitions_total", "to", "Open");

    assert_gauge_exists(&metrics, "circuitbreaker_failures");
    assert_gauge_exists(&metrics, "circuitbreaker_state");
    assert_eq!(
        gauge_value(&metrics, "circuitbreaker_state", "circuitbreaker", "test_cb"),
        Some(1.0)
    );
}
