use std::io;
use thiserror::Error;

/// Errors returned by a [`JobStore`](crate::JobStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store i/o failed for key `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    /// The key cannot be used by this store.
    #[error("invalid store key `{0}`")]
    InvalidKey(String),
    /// The store is not reachable at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures inside the queue. Never returned to callers; logged and reported
/// through [`OfflineQueueEvent::PersistFailed`](crate::OfflineQueueEvent).
#[derive(Debug, Error)]
pub(crate) enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode queue: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid job: {0}")]
    InvalidJob(&'static str),
}
