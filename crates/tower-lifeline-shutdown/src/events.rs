use crate::cause::ShutdownCause;
use std::time::{Duration, Instant};
use tower_lifeline_core::LifelineEvent;

/// Events emitted by the shutdown coordinator.
#[derive(Debug, Clone)]
pub enum ShutdownEvent {
    /// The first trigger fired and draining began.
    DrainStarted {
        source: String,
        timestamp: Instant,
        cause: ShutdownCause,
    },
    /// The server finished its in-flight work before the deadline.
    Drained {
        source: String,
        timestamp: Instant,
        elapsed: Duration,
    },
    /// The deadline passed with work still outstanding.
    DeadlineExceeded {
        source: String,
        timestamp: Instant,
        timeout: Duration,
    },
}

impl LifelineEvent for ShutdownEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShutdownEvent::DrainStarted { .. } => "drain_started",
            ShutdownEvent::Drained { .. } => "drained",
            ShutdownEvent::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ShutdownEvent::DrainStarted { timestamp, .. }
            | ShutdownEvent::Drained { timestamp, .. }
            | ShutdownEvent::DeadlineExceeded { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            ShutdownEvent::DrainStarted { source, .. }
            | ShutdownEvent::Drained { source, .. }
            | ShutdownEvent::DeadlineExceeded { source, .. } => source,
        }
    }
}
