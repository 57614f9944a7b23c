use std::fmt;
use std::time::Instant;
use tower_lifeline_core::LifelineEvent;

/// Why a job stayed in the queue after a send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetainReason {
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The send itself failed (connection refused, timeout, ...).
    Network(String),
    /// The job could not be turned into a request (bad method, URI or header).
    InvalidRequest(String),
}

impl fmt::Display for RetainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetainReason::Status(code) => write!(f, "status {code}"),
            RetainReason::Network(msg) => write!(f, "network error: {msg}"),
            RetainReason::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

/// Events emitted by the offline queue.
#[derive(Debug, Clone)]
pub enum OfflineQueueEvent {
    /// A job was persisted; `queue_len` is the length after pruning.
    Enqueued {
        source: String,
        timestamp: Instant,
        url: String,
        queue_len: usize,
    },
    /// A prune pass removed jobs.
    Pruned {
        source: String,
        timestamp: Instant,
        expired: usize,
        evicted: usize,
    },
    /// A job was attempted during a flush and kept for the next one.
    JobRetained {
        source: String,
        timestamp: Instant,
        url: String,
        reason: RetainReason,
    },
    /// A flush pass finished and its result was written back.
    FlushCompleted {
        source: String,
        timestamp: Instant,
        flushed: usize,
        remaining: usize,
    },
    /// Reading or writing the store failed; the operation degraded to a no-op.
    PersistFailed {
        source: String,
        timestamp: Instant,
        operation: &'static str,
        message: String,
    },
}

impl LifelineEvent for OfflineQueueEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OfflineQueueEvent::Enqueued { .. } => "enqueued",
            OfflineQueueEvent::Pruned { .. } => "pruned",
            OfflineQueueEvent::JobRetained { .. } => "job_retained",
            OfflineQueueEvent::FlushCompleted { .. } => "flush_completed",
            OfflineQueueEvent::PersistFailed { .. } => "persist_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            OfflineQueueEvent::Enqueued { timestamp, .. }
            | OfflineQueueEvent::Pruned { timestamp, .. }
            | OfflineQueueEvent::JobRetained { timestamp, .. }
            | OfflineQueueEvent::FlushCompleted { timestamp, .. }
            | OfflineQueueEvent::PersistFailed { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            OfflineQueueEvent::Enqueued { source, .. }
            | OfflineQueueEvent::Pruned { source, .. }
            | OfflineQueueEvent::JobRetained { source, .. }
            | OfflineQueueEvent::FlushCompleted { source, .. }
            | OfflineQueueEvent::PersistFailed { source, .. } => source,
        }
    }
}
