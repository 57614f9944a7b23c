use crate::cause::ShutdownCause;
use crate::coordinator::ShutdownCoordinator;
use crate::events::ShutdownEvent;
use std::time::Duration;
use tower_lifeline_core::{EventListeners, FnListener};

/// Default time allowed for in-flight work once draining starts.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default exit code when the deadline passes.
pub const DEFAULT_FORCED_EXIT_CODE: i32 = 1;

/// Configuration for the shutdown coordinator.
pub struct ShutdownConfig {
    pub(crate) drain_timeout: Duration,
    pub(crate) forced_exit_code: i32,
    pub(crate) panics_are_fatal: bool,
    pub(crate) handle_signals: bool,
    pub(crate) event_listeners: EventListeners<ShutdownEvent>,
    pub(crate) name: String,
}

impl ShutdownConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ShutdownConfigBuilder {
        ShutdownConfigBuilder::new()
    }

    /// Time allowed for the drain.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Exit code used when the deadline passes.
    pub fn forced_exit_code(&self) -> i32 {
        self.forced_exit_code
    }

    /// The coordinator's name, used in events and logs.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ShutdownConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownConfig")
            .field("drain_timeout", &self.drain_timeout)
            .field("forced_exit_code", &self.forced_exit_code)
            .field("panics_are_fatal", &self.panics_are_fatal)
            .field("handle_signals", &self.handle_signals)
            .field("name", &self.name)
            .finish()
    }
}

/// Builder for the shutdown coordinator.
pub struct ShutdownConfigBuilder {
    drain_timeout: Duration,
    forced_exit_code: i32,
    panics_are_fatal: bool,
    handle_signals: bool,
    event_listeners: EventListeners<ShutdownEvent>,
    name: String,
}

impl Default for ShutdownConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            forced_exit_code: DEFAULT_FORCED_EXIT_CODE,
            panics_are_fatal: true,
            handle_signals: true,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets how long in-flight work may run once draining starts.
    ///
    /// Default: 10 seconds
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sets the exit code reported when the deadline passes.
    ///
    /// Zero would read as a clean exit and is replaced by 1.
    ///
    /// Default: 1
    pub fn forced_exit_code(mut self, code: i32) -> Self {
        self.forced_exit_code = if code == 0 { 1 } else { code };
        self
    }

    /// Whether a panic on any thread starts the shutdown.
    ///
    /// The hook sees every panic, including ones later caught with
    /// `catch_unwind` or by a task's `JoinHandle`.
    ///
    /// Default: true
    pub fn panics_are_fatal(mut self, enabled: bool) -> Self {
        self.panics_are_fatal = enabled;
        self
    }

    /// Whether [`install`](ShutdownCoordinator::install) listens for SIGINT/SIGTERM.
    ///
    /// Default: true
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Give this coordinator a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a callback when draining starts.
    pub fn on_drain_started<F>(mut self, f: F) -> Self
    where
        F: Fn(&ShutdownCause) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ShutdownEvent| {
                if let ShutdownEvent::DrainStarted { cause, .. } = event {
                    f(cause);
                }
            }));
        self
    }

    /// Registers a callback when the drain completes, called with its duration.
    pub fn on_drained<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ShutdownEvent| {
                if let ShutdownEvent::Drained { elapsed, .. } = event {
                    f(*elapsed);
                }
            }));
        self
    }

    /// Registers a callback when the deadline passes.
    pub fn on_deadline_exceeded<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ShutdownEvent| {
                if let ShutdownEvent::DeadlineExceeded { timeout, .. } = event {
                    f(*timeout);
                }
            }));
        self
    }

    pub(crate) fn into_config(self) -> ShutdownConfig {
        ShutdownConfig {
            drain_timeout: self.drain_timeout,
            forced_exit_code: self.forced_exit_code,
            panics_are_fatal: self.panics_are_fatal,
            handle_signals: self.handle_signals,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the coordinator. Call [`install`](ShutdownCoordinator::install)
    /// to start listening for signals and panics.
    pub fn build(self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(self.into_config())
    }
}
