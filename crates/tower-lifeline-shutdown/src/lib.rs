//! Graceful shutdown coordination for Tower/axum servers.
//!
//! A [`ShutdownCoordinator`] reacts to the first of:
//! - SIGINT (Ctrl+C) or SIGTERM
//! - a panic on any thread (optional, on by default)
//! - a fatal error reported with [`ShutdownCoordinator::report_fatal`]
//!
//! It then resolves [`draining`](ShutdownCoordinator::draining) so the server
//! stops accepting connections, and gives in-flight requests a bounded window
//! (10 seconds by default) to finish. [`run`](ShutdownCoordinator::run)
//! reports how it went as a [`ShutdownOutcome`] whose
//! [`exit_code`](ShutdownOutcome::exit_code) is 0 for a completed drain and
//! non-zero otherwise.
//!
//! The lifecycle is `Running → Draining → Terminated` and only moves
//! forward. Triggers that arrive while draining are logged and ignored; the
//! deadline is never re-armed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tower_lifeline_shutdown::{ShutdownCoordinator, ShutdownOutcome};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = ShutdownCoordinator::builder()
//!     .drain_timeout(Duration::from_secs(10))
//!     .on_drain_started(|cause| eprintln!("shutting down: {cause}"))
//!     .build();
//! coordinator.install()?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! let server = axum::serve(listener, axum::Router::new())
//!     .with_graceful_shutdown(coordinator.draining());
//!
//! let outcome = coordinator.run(async { server.await }).await;
//! if let ShutdownOutcome::DeadlineExceeded { .. } = outcome {
//!     eprintln!("gave up waiting for in-flight requests");
//! }
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

pub use cause::ShutdownCause;
pub use config::{
    ShutdownConfig, ShutdownConfigBuilder, DEFAULT_DRAIN_TIMEOUT, DEFAULT_FORCED_EXIT_CODE,
};
pub use coordinator::{ShutdownCoordinator, ShutdownOutcome};
pub use error::ShutdownError;
pub use events::ShutdownEvent;
pub use state::ShutdownState;

mod cause;
mod config;
mod coordinator;
mod error;
mod events;
mod state;
