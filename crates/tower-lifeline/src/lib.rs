//! Keep services alive under failure.
//!
//! `tower-lifeline` bundles three mechanisms, each also available as its own
//! crate:
//!
//! - **Circuit Breaker** (`circuitbreaker` feature): ingress middleware that
//!   rejects requests with `503` and a retry hint once too many responses
//!   fail, then lets traffic through again after a cooldown
//! - **Offline Queue** (`offline` feature): persists mutating requests that
//!   failed while offline and replays them once connectivity returns
//! - **Shutdown** (`shutdown` feature): drains in-flight requests on SIGINT,
//!   SIGTERM, panics or reported fatal errors, and forces an exit after a
//!   deadline
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! tower-lifeline = { version = "0.1", features = ["circuitbreaker", "shutdown"] }
//! ```
//!
//! Or enable everything:
//!
//! ```toml
//! [dependencies]
//! tower-lifeline = { version = "0.1", features = ["full"] }
//! ```
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "circuitbreaker")]
//! # {
//! use tower::{Layer, service_fn};
//! use tower_lifeline::circuitbreaker::HttpCircuitBreakerLayer;
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! let breaker = HttpCircuitBreakerLayer::builder()
//!     .threshold(20)
//!     .reset_time(Duration::from_secs(15))
//!     .build_http();
//!
//! let _service = breaker.layer(service_fn(|_req: http::Request<String>| async {
//!     Ok::<_, Infallible>(http::Response::new(String::from("ok")))
//! }));
//! # }
//! ```
//!
//! # Individual Crates
//!
//! - `tower-lifeline-circuitbreaker`
//! - `tower-lifeline-offline`
//! - `tower-lifeline-shutdown`
//! - `tower-lifeline-core` (shared event system and clock helpers)

// Re-export core (always available)
pub use tower_lifeline_core as core;

#[cfg(feature = "circuitbreaker")]
pub use tower_lifeline_circuitbreaker as circuitbreaker;

#[cfg(feature = "offline")]
pub use tower_lifeline_offline as offline;

#[cfg(feature = "shutdown")]
pub use tower_lifeline_shutdown as shutdown;
