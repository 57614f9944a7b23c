//! Durable offline request queue for Tower clients.
//!
//! When a mutating request fails because the network is gone, hand it to an
//! [`OfflineQueue`]. The queue persists it in a [`JobStore`] and replays it
//! through a Tower send service once the client is back online, on a timer,
//! or right away if the client still believes it is online.
//!
//! - Jobs older than 24 hours are dropped, and at most 100 are kept (the
//!   newest win).
//! - Jobs are replayed in enqueue order, one at a time; a job is removed only
//!   after a 2xx answer. Delivery is at-least-once.
//! - Nothing here returns an error to the caller. Storage failures are logged
//!   and the operation degrades to a no-op.
//!
//! ## Basic Example
//!
//! ```rust,no_run
//! use tower_lifeline_offline::{Connectivity, FileStore, NewJob, OfflineQueue, OfflineQueueConfig};
//! use tower::service_fn;
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connectivity = Connectivity::online();
//! let send = service_fn(|req: http::Request<String>| async move {
//!     // hand the request to your HTTP client here
//!     let _ = req;
//!     Ok::<_, Infallible>(http::Response::new(()))
//! });
//!
//! let config = OfflineQueueConfig::builder()
//!     .name("bookings")
//!     .base_url("https://api.example.com")
//!     .flush_interval(Duration::from_secs(300))
//!     .on_flush_completed(|flushed, remaining| {
//!         println!("replayed {flushed}, {remaining} still queued");
//!     })
//!     .build();
//!
//! let queue = OfflineQueue::new(
//!     config,
//!     Arc::new(FileStore::open("/var/lib/app/queue")?),
//!     send,
//!     connectivity.clone(),
//! );
//! let _triggers = queue.spawn_flush_triggers();
//!
//! // a request just failed
//! connectivity.set_online(false);
//! queue.enqueue(NewJob::post("/api/bookings").body(serde_json::json!({ "room": 12 })));
//!
//! // later, the network is back: a flush starts on its own
//! connectivity.set_online(true);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enqueue/flush counters and the queue depth gauge via the `metrics` crate

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use config::{
    OfflineQueueConfig, OfflineQueueConfigBuilder, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_AGE,
    DEFAULT_MAX_QUEUE_SIZE, DEFAULT_STORAGE_KEY,
};
pub use connectivity::Connectivity;
pub use error::StoreError;
pub use events::{OfflineQueueEvent, RetainReason};
pub use job::{Job, NewJob};
pub use queue::{prune, FlushReport, OfflineQueue, PruneStats, ReplayResponse};
pub use store::{FileStore, JobStore, MemoryStore};
pub use triggers::FlushTriggers;

mod config;
mod connectivity;
mod error;
mod events;
mod job;
mod queue;
pub mod store;
mod triggers;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "offline_queue_jobs_enqueued_total",
            "Total number of jobs persisted to the offline queue"
        );
        describe_counter!(
            "offline_queue_jobs_flushed_total",
            "Total number of queued jobs delivered by a flush"
        );
        describe_gauge!(
            "offline_queue_depth",
            "Jobs currently waiting in the offline queue"
        );
    });
}
