use crate::config::OfflineQueueConfig;
use crate::connectivity::Connectivity;
use crate::error::QueueError;
use crate::events::{OfflineQueueEvent, RetainReason};
use crate::job::{Job, NewJob};
use crate::store::JobStore;
use crate::triggers::{self, FlushTriggers};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{BoxError, Service, ServiceExt};
use tower_lifeline_core::clock::age_millis;
use tower_lifeline_core::epoch_millis;

/// Responses the queue can judge delivery from.
pub trait ReplayResponse {
    /// The HTTP status of the response.
    fn status(&self) -> StatusCode;
}

impl<B> ReplayResponse for http::Response<B> {
    fn status(&self) -> StatusCode {
        http::Response::status(self)
    }
}

impl ReplayResponse for StatusCode {
    fn status(&self) -> StatusCode {
        *self
    }
}

/// Result of one [`flush`](OfflineQueue::flush) call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Jobs delivered and removed from the queue.
    pub flushed: usize,
    /// Jobs left in the queue after the pass.
    pub remaining: usize,
    /// `true` when another flush was already running. Nothing was sent by
    /// this call; the running flush makes one more pass instead.
    pub skipped: bool,
}

/// What a prune pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Jobs dropped for being older than the maximum age.
    pub expired: usize,
    /// Jobs dropped to get back under the size bound.
    pub evicted: usize,
}

impl PruneStats {
    /// Returns `true` if nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.evicted == 0
    }
}

/// Drops jobs at least `max_age` old, then the oldest jobs beyond `max_size`.
///
/// `jobs` must be in enqueue order; the newest entries are kept.
pub fn prune(jobs: &mut Vec<Job>, now: u64, max_age: Duration, max_size: usize) -> PruneStats {
    let max_age_ms = max_age.as_millis() as u64;
    let before = jobs.len();
    jobs.retain(|job| age_millis(job.timestamp, now) < max_age_ms);
    let expired = before - jobs.len();

    let evicted = jobs.len().saturating_sub(max_size);
    jobs.drain(..evicted);

    PruneStats { expired, evicted }
}

/// Durable queue of requests that failed while the client was offline.
///
/// Jobs are persisted in a [`JobStore`] and replayed in enqueue order through
/// the send service `S`. A job is removed only once the service answers with a
/// 2xx status, so delivery is at-least-once: handlers on the receiving side
/// have to be idempotent.
///
/// None of the queue operations fail. Store and encoding errors are logged,
/// reported as [`OfflineQueueEvent::PersistFailed`] and the operation becomes
/// a no-op.
///
/// ```rust
/// use tower_lifeline_offline::{Connectivity, MemoryStore, NewJob, OfflineQueue, OfflineQueueConfig};
/// use tower::service_fn;
/// use std::convert::Infallible;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let send = service_fn(|_req: http::Request<String>| async {
///     Ok::<_, Infallible>(http::StatusCode::OK)
/// });
/// let connectivity = Connectivity::offline();
/// let queue = OfflineQueue::new(
///     OfflineQueueConfig::default(),
///     Arc::new(MemoryStore::new()),
///     send,
///     connectivity.clone(),
/// );
///
/// queue.enqueue(NewJob::post("/api/bookings").body(serde_json::json!({ "room": 12 })));
/// assert_eq!(queue.queue_size(), 1);
///
/// let report = queue.flush().await;
/// assert_eq!(report.flushed, 1);
/// # }
/// ```
pub struct OfflineQueue<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    config: OfflineQueueConfig,
    store: Arc<dyn JobStore>,
    sender: Mutex<S>,
    connectivity: Connectivity,
    flushing: AtomicBool,
    // Set by a flush that found another one running.
    flush_requested: AtomicBool,
    // Serializes read-modify-write cycles on the store.
    store_lock: Mutex<()>,
}

impl<S> Clone for OfflineQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for OfflineQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("config", &self.inner.config)
            .field("online", &self.inner.connectivity.is_online())
            .field("flushing", &self.inner.flushing.load(Ordering::Relaxed))
            .finish()
    }
}

struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<S> OfflineQueue<S> {
    /// Creates a queue over `store` that replays jobs through `sender`.
    pub fn new(
        config: OfflineQueueConfig,
        store: Arc<dyn JobStore>,
        sender: S,
        connectivity: Connectivity,
    ) -> Self {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                sender: Mutex::new(sender),
                connectivity,
                flushing: AtomicBool::new(false),
                flush_requested: AtomicBool::new(false),
                store_lock: Mutex::new(()),
            }),
        }
    }

    /// The queue's configuration.
    pub fn config(&self) -> &OfflineQueueConfig {
        &self.inner.config
    }

    /// The connectivity flag the queue consults.
    pub fn connectivity(&self) -> &Connectivity {
        &self.inner.connectivity
    }

    /// Returns `true` while a flush pass is running.
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.load(Ordering::Acquire)
    }

    /// Returns the number of persisted jobs.
    ///
    /// A missing or unreadable store counts as empty.
    pub fn queue_size(&self) -> usize {
        self.pending_jobs().len()
    }

    /// Returns a snapshot of the persisted jobs in enqueue order.
    pub fn pending_jobs(&self) -> Vec<Job> {
        match self.load() {
            Ok(jobs) => jobs,
            Err(err) => {
                self.persist_failed("read", &err);
                Vec::new()
            }
        }
    }

    /// Removes every persisted job.
    pub fn clear_queue(&self) {
        let result = {
            let _store = self.inner.store_lock.lock();
            self.inner.store.remove(&self.inner.config.storage_key)
        };
        match result {
            Ok(()) => {
                tracing::info!(queue = %self.inner.config.name, "offline queue cleared");
                #[cfg(feature = "metrics")]
                gauge!("offline_queue_depth", "queue" => self.inner.config.name.clone()).set(0.0);
            }
            Err(err) => self.persist_failed("clear", &err.into()),
        }
    }

    fn load(&self) -> Result<Vec<Job>, QueueError> {
        let Some(raw) = self.inner.store.get(&self.inner.config.storage_key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(jobs) => Ok(jobs),
            Err(err) => {
                tracing::warn!(
                    queue = %self.inner.config.name,
                    error = %err,
                    "discarding unreadable queue contents"
                );
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, jobs: &[Job]) -> Result<(), QueueError> {
        let raw = serde_json::to_string(jobs)?;
        self.inner.store.set(&self.inner.config.storage_key, &raw)?;
        Ok(())
    }

    fn try_enqueue(&self, job: NewJob) -> Result<(usize, PruneStats), QueueError> {
        job.validate().map_err(QueueError::InvalidJob)?;
        let now = epoch_millis();
        let job = job.stamp(now);

        let _store = self.inner.store_lock.lock();
        let mut jobs = self.load()?;
        jobs.push(job);
        let stats = prune(
            &mut jobs,
            now,
            self.inner.config.max_age,
            self.inner.config.max_queue_size,
        );
        self.save(&jobs)?;
        Ok((jobs.len(), stats))
    }

    // Retained jobs only survive if nothing removed them from the store
    // meanwhile (a clear, or eviction by a concurrent enqueue); jobs that
    // appeared during the pass are appended after them.
    fn write_back(
        &self,
        snapshot: &[Job],
        retained: Vec<Job>,
    ) -> Result<(usize, PruneStats), QueueError> {
        let _store = self.inner.store_lock.lock();
        let current = self.load()?;

        let mut jobs: Vec<Job> = retained
            .into_iter()
            .filter(|job| current.contains(job))
            .collect();
        jobs.extend(current.into_iter().filter(|job| !snapshot.contains(job)));

        let stats = prune(
            &mut jobs,
            epoch_millis(),
            self.inner.config.max_age,
            self.inner.config.max_queue_size,
        );
        self.save(&jobs)?;
        Ok((jobs.len(), stats))
    }

    fn build_request(&self, job: &Job) -> Result<Request<String>, RetainReason> {
        fn invalid(err: impl std::fmt::Display) -> RetainReason {
            RetainReason::InvalidRequest(err.to_string())
        }

        let config = &self.inner.config;
        let method = Method::from_bytes(job.method.to_ascii_uppercase().as_bytes()).map_err(invalid)?;
        let uri = match &config.base_url {
            Some(base) if job.url.starts_with('/') => format!("{base}{}", job.url),
            _ => job.url.clone(),
        };
        let body = match &job.body {
            Some(value) => serde_json::to_string(value).map_err(invalid)?,
            None => String::new(),
        };

        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .map_err(invalid)?;

        let headers = request.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&config.content_type).map_err(invalid)?,
        );
        for (name, value) in &job.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).map_err(invalid)?,
                HeaderValue::from_str(value).map_err(invalid)?,
            );
        }
        Ok(request)
    }

    fn emit(&self, event: OfflineQueueEvent) {
        self.inner.config.event_listeners.emit(&event);
    }

    fn emit_pruned(&self, stats: PruneStats) {
        if stats.is_empty() {
            return;
        }
        tracing::debug!(
            queue = %self.inner.config.name,
            expired = stats.expired,
            evicted = stats.evicted,
            "pruned offline queue"
        );
        self.emit(OfflineQueueEvent::Pruned {
            source: self.inner.config.name.clone(),
            timestamp: Instant::now(),
            expired: stats.expired,
            evicted: stats.evicted,
        });
    }

    fn persist_failed(&self, operation: &'static str, err: &QueueError) {
        tracing::warn!(
            queue = %self.inner.config.name,
            operation,
            error = %err,
            "offline queue storage failed"
        );
        self.emit(OfflineQueueEvent::PersistFailed {
            source: self.inner.config.name.clone(),
            timestamp: Instant::now(),
            operation,
            message: err.to_string(),
        });
    }

    #[cfg(feature = "metrics")]
    fn record_depth(&self, depth: usize) {
        gauge!("offline_queue_depth", "queue" => self.inner.config.name.clone()).set(depth as f64);
    }
}

impl<S> OfflineQueue<S>
where
    S: Service<Request<String>> + Clone + Send + 'static,
    S::Response: ReplayResponse,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    /// Persists `job`, stamped with the current time, then prunes the queue.
    ///
    /// If the client is online a flush is started in the background. Storage
    /// failures are logged and the job is dropped.
    pub fn enqueue(&self, job: NewJob) {
        let url = job.url().to_string();
        match self.try_enqueue(job) {
            Ok((queue_len, stats)) => {
                tracing::debug!(queue = %self.inner.config.name, url = %url, queue_len, "job enqueued");
                self.emit(OfflineQueueEvent::Enqueued {
                    source: self.inner.config.name.clone(),
                    timestamp: Instant::now(),
                    url,
                    queue_len,
                });
                self.emit_pruned(stats);

                #[cfg(feature = "metrics")]
                {
                    counter!("offline_queue_jobs_enqueued_total", "queue" => self.inner.config.name.clone())
                        .increment(1);
                    self.record_depth(queue_len);
                }
            }
            Err(QueueError::InvalidJob(reason)) => {
                tracing::warn!(queue = %self.inner.config.name, url = %url, reason, "ignoring invalid job");
                return;
            }
            Err(err) => {
                self.persist_failed("enqueue", &err);
                return;
            }
        }

        if self.inner.connectivity.is_online() {
            self.spawn_flush();
        }
    }

    fn spawn_flush(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move {
                    queue.flush().await;
                });
            }
            Err(_) => {
                tracing::debug!(
                    queue = %self.inner.config.name,
                    "no tokio runtime, flush left to the next trigger"
                );
            }
        }
    }

    /// Replays every persisted job once, in enqueue order.
    ///
    /// Delivered jobs (2xx) are removed; everything else stays queued. Only
    /// one pass runs at a time: a call made while another pass is in flight
    /// returns immediately with [`FlushReport::skipped`] set, and the running
    /// flush makes one more pass once its current one is written back. Jobs
    /// enqueued while online during a pass are therefore still sent.
    pub async fn flush(&self) -> FlushReport {
        if !self.begin_flush() {
            tracing::debug!(queue = %self.inner.config.name, "flush already in progress, pass requested");
            return FlushReport {
                skipped: true,
                ..FlushReport::default()
            };
        }

        let mut report = FlushReport::default();
        loop {
            let pass = {
                let _flushing = FlushGuard(&self.inner.flushing);
                self.inner.flush_requested.store(false, Ordering::SeqCst);
                self.flush_pass().await
            };
            report.flushed += pass.flushed;
            report.remaining = pass.remaining;

            // A skipped caller that saw the flag still set asked for another
            // pass; if someone else took the flag meanwhile, their pass covers it.
            if !self.inner.flush_requested.swap(false, Ordering::SeqCst)
                || self.inner.flushing.swap(true, Ordering::SeqCst)
            {
                return report;
            }
            tracing::debug!(queue = %self.inner.config.name, "running requested flush pass");
        }
    }

    // Returns `true` if the caller now owns the flushing flag. Otherwise a
    // pass has been requested from the current owner.
    fn begin_flush(&self) -> bool {
        loop {
            if !self.inner.flushing.swap(true, Ordering::SeqCst) {
                return true;
            }
            self.inner.flush_requested.store(true, Ordering::SeqCst);
            if self.inner.flushing.load(Ordering::SeqCst) {
                return false;
            }
        }
    }

    async fn flush_pass(&self) -> FlushReport {
        let snapshot = {
            let _store = self.inner.store_lock.lock();
            self.load()
        };
        let snapshot = match snapshot {
            Ok(jobs) => jobs,
            Err(err) => {
                self.persist_failed("flush", &err);
                return FlushReport::default();
            }
        };
        if snapshot.is_empty() {
            return FlushReport::default();
        }

        tracing::debug!(queue = %self.inner.config.name, jobs = snapshot.len(), "flushing offline queue");

        let mut flushed = 0;
        let mut retained = Vec::new();
        for job in &snapshot {
            match self.send(job).await {
                Ok(()) => flushed += 1,
                Err(reason) => {
                    tracing::debug!(
                        queue = %self.inner.config.name,
                        url = %job.url,
                        reason = %reason,
                        "job retained"
                    );
                    self.emit(OfflineQueueEvent::JobRetained {
                        source: self.inner.config.name.clone(),
                        timestamp: Instant::now(),
                        url: job.url.clone(),
                        reason,
                    });
                    retained.push(job.clone());
                }
            }
        }

        #[cfg(feature = "metrics")]
        counter!("offline_queue_jobs_flushed_total", "queue" => self.inner.config.name.clone())
            .increment(flushed as u64);

        let remaining = match self.write_back(&snapshot, retained) {
            Ok((remaining, stats)) => {
                self.emit_pruned(stats);
                remaining
            }
            Err(err) => {
                // The pre-flush list is still in the store; delivered jobs
                // will be sent again.
                self.persist_failed("flush", &err);
                snapshot.len()
            }
        };

        tracing::info!(
            queue = %self.inner.config.name,
            flushed,
            remaining,
            "offline queue flushed"
        );
        self.emit(OfflineQueueEvent::FlushCompleted {
            source: self.inner.config.name.clone(),
            timestamp: Instant::now(),
            flushed,
            remaining,
        });
        #[cfg(feature = "metrics")]
        self.record_depth(remaining);

        FlushReport {
            flushed,
            remaining,
            skipped: false,
        }
    }

    async fn send(&self, job: &Job) -> Result<(), RetainReason> {
        let request = self.build_request(job)?;
        let service = self.inner.sender.lock().clone();
        let response = service.oneshot(request).await.map_err(|err| {
            let err: BoxError = err.into();
            RetainReason::Network(err.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RetainReason::Status(status.as_u16()))
        }
    }

    /// Starts the background flush triggers: a flush on every offline-to-online
    /// transition and one every [`flush_interval`](OfflineQueueConfig::flush_interval).
    ///
    /// The triggers run until the returned handle is stopped or dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_flush_triggers(&self) -> FlushTriggers {
        triggers::spawn(self.clone())
    }
}
