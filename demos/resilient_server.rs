//! Resilient HTTP server
//!
//! This example demonstrates:
//! 1. An HTTP circuit breaker in front of an axum router
//! 2. Failure injection to trip the breaker on demand
//! 3. Graceful shutdown with a bounded drain window
//!
//! Try it:
//!
//! ```text
//! cargo run --example resilient_server -- --threshold 5
//! curl -X POST 'http://127.0.0.1:3000/admin/outage?enabled=true'
//! for i in $(seq 6); do curl -i http://127.0.0.1:3000/orders; done
//! curl http://127.0.0.1:3000/slow &   # then press Ctrl+C
//! ```

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_lifeline_circuitbreaker::HttpCircuitBreakerLayer;
use tower_lifeline_shutdown::ShutdownCoordinator;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Demo server guarded by a circuit breaker and a shutdown coordinator")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Failures that open the circuit
    #[arg(long, default_value_t = 20)]
    threshold: u32,

    /// Seconds the circuit stays open
    #[arg(long, default_value_t = 15)]
    reset_secs: u64,

    /// Seconds in-flight requests get after a shutdown signal
    #[arg(long, default_value_t = 10)]
    drain_secs: u64,
}

#[derive(Clone, Default)]
struct AppState {
    outage: Arc<AtomicBool>,
}

#[derive(Deserialize)]
struct OutageParams {
    enabled: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let breaker = HttpCircuitBreakerLayer::builder()
        .name("ingress")
        .threshold(args.threshold)
        .reset_time(Duration::from_secs(args.reset_secs))
        .on_state_transition(|from, to| {
            tracing::info!("circuit breaker: {:?} -> {:?}", from, to);
        })
        .build_http();

    let coordinator = ShutdownCoordinator::builder()
        .name("resilient-server")
        .drain_timeout(Duration::from_secs(args.drain_secs))
        .build();
    if let Err(err) = coordinator.install() {
        tracing::error!(error = %err, "could not install shutdown handlers");
        std::process::exit(1);
    }

    let app = Router::new()
        .route("/orders", get(orders))
        .route("/slow", get(slow))
        .route("/admin/outage", post(set_outage))
        .with_state(AppState::default())
        .layer(breaker);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "bind failed");
            std::process::exit(1);
        }
    };
    tracing::info!("listening on http://{}", addr);

    let draining = coordinator.draining();
    coordinator
        .run_and_exit(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(draining)
                .await
        })
        .await;
}

/// Fails with 500 while the simulated outage is on.
async fn orders(State(state): State<AppState>) -> impl IntoResponse {
    if state.outage.load(Ordering::Relaxed) {
        tracing::warn!("simulated outage, failing request");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": "orders backend unavailable" })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({ "orders": [{ "id": 1, "item": "coffee" }] })),
    )
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "finished"
}

async fn set_outage(
    State(state): State<AppState>,
    Query(params): Query<OutageParams>,
) -> StatusCode {
    state.outage.store(params.enabled, Ordering::Relaxed);
    tracing::info!(enabled = params.enabled, "outage toggled");
    StatusCode::NO_CONTENT
}
