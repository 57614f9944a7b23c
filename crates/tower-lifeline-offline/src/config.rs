use crate::events::{OfflineQueueEvent, RetainReason};
use std::time::Duration;
use tower_lifeline_core::{EventListeners, FnListener};

/// Default upper bound on queued jobs.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Default age after which a job is dropped.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Default period of the background flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default store key holding the job list.
pub const DEFAULT_STORAGE_KEY: &str = "offline_queue";

pub(crate) const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Configuration for an [`OfflineQueue`](crate::OfflineQueue).
pub struct OfflineQueueConfig {
    pub(crate) max_queue_size: usize,
    pub(crate) max_age: Duration,
    pub(crate) flush_interval: Duration,
    pub(crate) storage_key: String,
    pub(crate) content_type: String,
    pub(crate) base_url: Option<String>,
    pub(crate) event_listeners: EventListeners<OfflineQueueEvent>,
    pub(crate) name: String,
}

impl OfflineQueueConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OfflineQueueConfigBuilder {
        OfflineQueueConfigBuilder::new()
    }

    /// Upper bound on queued jobs.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Age after which a job is dropped.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Period of the background flush.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Store key holding the job list.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// The queue's name, used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for OfflineQueueConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for OfflineQueueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueueConfig")
            .field("max_queue_size", &self.max_queue_size)
            .field("max_age", &self.max_age)
            .field("flush_interval", &self.flush_interval)
            .field("storage_key", &self.storage_key)
            .field("content_type", &self.content_type)
            .field("base_url", &self.base_url)
            .field("name", &self.name)
            .finish()
    }
}

/// Builder for [`OfflineQueueConfig`].
pub struct OfflineQueueConfigBuilder {
    max_queue_size: usize,
    max_age: Duration,
    flush_interval: Duration,
    storage_key: String,
    content_type: String,
    base_url: Option<String>,
    event_listeners: EventListeners<OfflineQueueEvent>,
    name: String,
}

impl Default for OfflineQueueConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineQueueConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_age: DEFAULT_MAX_AGE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            base_url: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the maximum number of queued jobs. When exceeded, the oldest are dropped.
    ///
    /// Values below 1 are treated as 1.
    ///
    /// Default: 100
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size.max(1);
        self
    }

    /// Sets the age after which a job is dropped by the next prune pass.
    ///
    /// Default: 24 hours
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    /// Sets the period of the background flush started by
    /// [`spawn_flush_triggers`](crate::OfflineQueue::spawn_flush_triggers).
    ///
    /// Default: 5 minutes
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the store key holding the job list.
    ///
    /// Default: `offline_queue`
    pub fn storage_key<K: Into<String>>(mut self, key: K) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the `content-type` sent with every job unless the job overrides it.
    ///
    /// Default: `application/json`
    pub fn content_type<T: Into<String>>(mut self, content_type: T) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Prefix applied to job URLs that start with `/`.
    ///
    /// Jobs usually carry paths relative to the API origin; the base lets the
    /// send service receive absolute URIs.
    pub fn base_url<U: Into<String>>(mut self, base: U) -> Self {
        self.base_url = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// Give this queue a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a callback when a job is persisted, called with its URL and
    /// the queue length after pruning.
    pub fn on_enqueued<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &OfflineQueueEvent| {
                if let OfflineQueueEvent::Enqueued { url, queue_len, .. } = event {
                    f(url, *queue_len);
                }
            }));
        self
    }

    /// Registers a callback when a job stays queued after a send attempt.
    pub fn on_job_retained<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &RetainReason) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &OfflineQueueEvent| {
                if let OfflineQueueEvent::JobRetained { url, reason, .. } = event {
                    f(url, reason);
                }
            }));
        self
    }

    /// Registers a callback when a flush pass completes, called with
    /// `(flushed, remaining)`.
    pub fn on_flush_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &OfflineQueueEvent| {
                if let OfflineQueueEvent::FlushCompleted {
                    flushed, remaining, ..
                } = event
                {
                    f(*flushed, *remaining);
                }
            }));
        self
    }

    /// Registers a callback when the store could not be read or written.
    pub fn on_persist_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str, &str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &OfflineQueueEvent| {
                if let OfflineQueueEvent::PersistFailed {
                    operation, message, ..
                } = event
                {
                    f(operation, message);
                }
            }));
        self
    }

    /// Registers a listener for every queue event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&OfflineQueueEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OfflineQueueConfig {
        OfflineQueueConfig {
            max_queue_size: self.max_queue_size,
            max_age: self.max_age,
            flush_interval: self.flush_interval,
            storage_key: self.storage_key,
            content_type: self.content_type,
            base_url: self.base_url,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
