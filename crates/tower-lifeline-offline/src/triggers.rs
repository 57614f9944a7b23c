use crate::queue::{OfflineQueue, ReplayResponse};
use http::Request;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tower::{BoxError, Service};

/// Handle to the background flush triggers of an [`OfflineQueue`].
///
/// The triggers stop when this handle is dropped.
#[derive(Debug)]
pub struct FlushTriggers {
    task: JoinHandle<()>,
}

impl FlushTriggers {
    /// Stops the triggers. A flush already in progress is cancelled; the jobs
    /// it had not yet written back stay queued.
    pub fn stop(self) {
        drop(self);
    }

    /// Returns `true` once the trigger task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for FlushTriggers {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn spawn<S>(queue: OfflineQueue<S>) -> FlushTriggers
where
    S: Service<Request<String>> + Clone + Send + 'static,
    S::Response: ReplayResponse,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    let task = tokio::spawn(async move {
        let period = queue.config().flush_interval();
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut online = queue.connectivity().subscribe();
        let mut was_online = *online.borrow_and_update();

        tracing::debug!(
            queue = %queue.config().name(),
            interval_ms = period.as_millis() as u64,
            "offline queue flush triggers started"
        );

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    tracing::trace!(queue = %queue.config().name(), "periodic flush");
                    queue.flush().await;
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online && !was_online {
                        tracing::debug!(queue = %queue.config().name(), "back online, flushing");
                        queue.flush().await;
                    }
                    was_online = now_online;
                }
            }
        }
    });

    FlushTriggers { task }
}
