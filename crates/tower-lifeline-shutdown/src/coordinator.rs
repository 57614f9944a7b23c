use crate::cause::{panic_message, ShutdownCause};
use crate::config::{ShutdownConfig, ShutdownConfigBuilder};
use crate::error::ShutdownError;
use crate::events::ShutdownEvent;
use crate::state::{ShutdownState, StateCell};
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

static PANIC_HOOK: Once = Once::new();

// Coordinators the panic hook dispatches to.
static PANIC_HOOK_COORDINATORS: Mutex<Vec<Weak<Inner>>> = parking_lot::const_mutex(Vec::new());

/// How a coordinated shutdown ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The server finished its in-flight work in time.
    ///
    /// `cause` is `None` when the server stopped without any trigger.
    Drained {
        cause: Option<ShutdownCause>,
        elapsed: Duration,
    },
    /// The deadline passed first; outstanding work is abandoned.
    DeadlineExceeded {
        cause: Option<ShutdownCause>,
        timeout: Duration,
        exit_code: i32,
    },
    /// The server future itself failed.
    ServerError {
        cause: Option<ShutdownCause>,
        message: String,
    },
}

impl ShutdownOutcome {
    /// The process exit code for this outcome: 0 only for a completed drain.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Drained { .. } => 0,
            ShutdownOutcome::DeadlineExceeded { exit_code, .. } => *exit_code,
            ShutdownOutcome::ServerError { .. } => 1,
        }
    }

    /// The trigger that started the shutdown, if any.
    pub fn cause(&self) -> Option<&ShutdownCause> {
        match self {
            ShutdownOutcome::Drained { cause, .. }
            | ShutdownOutcome::DeadlineExceeded { cause, .. }
            | ShutdownOutcome::ServerError { cause, .. } => cause.as_ref(),
        }
    }
}

/// Coordinates a graceful shutdown.
///
/// The coordinator turns the first trigger (a signal, a panic, or a fatal
/// error reported by the application) into a drain: the server stops
/// accepting connections, in-flight requests get [`drain_timeout`] to finish,
/// and the outcome says which exit code the process should end with.
///
/// Later triggers are logged and ignored; they never extend the deadline.
///
/// ```rust,no_run
/// use tower_lifeline_shutdown::ShutdownCoordinator;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let coordinator = ShutdownCoordinator::builder().name("api").build();
/// coordinator.install()?;
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// let app = axum::Router::new();
/// let server = axum::serve(listener, app).with_graceful_shutdown(coordinator.draining());
///
/// coordinator.run_and_exit(async { server.await }).await;
/// # Ok(())
/// # }
/// ```
///
/// [`drain_timeout`]: crate::ShutdownConfigBuilder::drain_timeout
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: ShutdownConfig,
    state: StateCell,
    cause: watch::Sender<Option<ShutdownCause>>,
    triggered_at: Mutex<Option<Instant>>,
    signals_installed: AtomicBool,
    panic_hook_installed: AtomicBool,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("config", &self.inner.config)
            .field("state", &self.inner.state.get())
            .field("cause", &self.cause())
            .finish()
    }
}

impl ShutdownCoordinator {
    /// Creates a new configuration builder.
    pub fn builder() -> ShutdownConfigBuilder {
        ShutdownConfigBuilder::new()
    }

    pub(crate) fn new(config: ShutdownConfig) -> Self {
        let (cause, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                state: StateCell::new(),
                cause,
                triggered_at: Mutex::new(None),
                signals_installed: AtomicBool::new(false),
                panic_hook_installed: AtomicBool::new(false),
            }),
        }
    }

    /// The coordinator's configuration.
    pub fn config(&self) -> &ShutdownConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShutdownState {
        self.inner.state.get()
    }

    /// Returns `true` once a trigger has fired.
    pub fn is_draining(&self) -> bool {
        self.state() != ShutdownState::Running
    }

    /// The trigger that won, if any.
    pub fn cause(&self) -> Option<ShutdownCause> {
        self.inner.cause.borrow().clone()
    }

    /// Registers the SIGINT/SIGTERM listener and the panic hook, as configured.
    ///
    /// Calling it again is a no-op. Signal handling needs a tokio runtime.
    ///
    /// The panic hook is process-global and stays installed for the life of
    /// the process. It is set once, chains to the hook that was in place
    /// before it, and dispatches to every live coordinator that enabled
    /// [`panics_are_fatal`]; dropped coordinators are forgotten.
    ///
    /// [`panics_are_fatal`]: crate::ShutdownConfigBuilder::panics_are_fatal
    pub fn install(&self) -> Result<(), ShutdownError> {
        let config = &self.inner.config;
        if config.handle_signals && !self.inner.signals_installed.swap(true, Ordering::AcqRel) {
            if let Err(err) = self.install_signals() {
                self.inner.signals_installed.store(false, Ordering::Release);
                return Err(err);
            }
        }
        if config.panics_are_fatal && !self.inner.panic_hook_installed.swap(true, Ordering::AcqRel)
        {
            self.install_panic_hook();
        }
        tracing::debug!(
            coordinator = %config.name,
            signals = config.handle_signals,
            panics = config.panics_are_fatal,
            "shutdown coordinator installed"
        );
        Ok(())
    }

    fn install_signals(&self) -> Result<(), ShutdownError> {
        let handle = tokio::runtime::Handle::try_current()?;

        #[cfg(unix)]
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).map_err(
                |source| ShutdownError::SignalInstall {
                    signal: "SIGTERM",
                    source,
                },
            )?;

        let coordinator = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            loop {
                #[cfg(unix)]
                let terminated = terminate.recv();
                #[cfg(not(unix))]
                let terminated = std::future::pending::<Option<()>>();

                let cause = tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => ShutdownCause::Interrupt,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to listen for ctrl-c");
                            return;
                        }
                    },
                    Some(()) = terminated => ShutdownCause::Terminate,
                };

                match upgrade(&coordinator) {
                    Some(coordinator) => {
                        coordinator.trigger(cause);
                    }
                    None => return,
                }
            }
        });
        Ok(())
    }

    fn install_panic_hook(&self) {
        {
            let mut registered = PANIC_HOOK_COORDINATORS.lock();
            registered.retain(|coordinator| coordinator.strong_count() > 0);
            registered.push(Arc::downgrade(&self.inner));
        }

        PANIC_HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                previous(info);
                // Collected first so the registry lock is not held while
                // listeners run; a panicking listener re-enters this hook.
                let live: Vec<ShutdownCoordinator> = {
                    let mut registered = PANIC_HOOK_COORDINATORS.lock();
                    registered.retain(|coordinator| coordinator.strong_count() > 0);
                    registered.iter().filter_map(upgrade).collect()
                };
                if live.is_empty() {
                    return;
                }
                let location = info.location().map(|l| l.to_string());
                let cause = ShutdownCause::Panic(panic_message(info.payload(), location));
                for coordinator in live {
                    coordinator.trigger(cause.clone());
                }
            }));
        });
    }

    /// Starts the shutdown. Returns `false` if one was already under way, in
    /// which case the call only logs.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        let name = &self.inner.config.name;
        if let Err(state) = self.inner.state.begin_draining() {
            tracing::warn!(
                coordinator = %name,
                cause = %cause,
                state = state.as_str(),
                "shutdown already in progress, ignoring trigger"
            );
            return false;
        }

        *self.inner.triggered_at.lock() = Some(Instant::now());

        if cause.is_fatal() {
            tracing::error!(coordinator = %name, cause = %cause, "fatal error, draining before exit");
        } else {
            tracing::info!(coordinator = %name, cause = %cause, "shutdown requested, draining");
        }

        self.inner
            .config
            .event_listeners
            .emit(&ShutdownEvent::DrainStarted {
                source: name.clone(),
                timestamp: std::time::Instant::now(),
                cause: cause.clone(),
            });
        self.inner.cause.send_replace(Some(cause));
        true
    }

    /// Reports an unrecoverable error and starts the shutdown.
    pub fn report_fatal(&self, err: impl Display) -> bool {
        self.trigger(ShutdownCause::Fatal(err.to_string()))
    }

    /// Waits for the first trigger and returns its cause.
    pub async fn triggered(&self) -> ShutdownCause {
        let mut rx = self.inner.cause.subscribe();
        let cause = match rx.wait_for(Option::is_some).await {
            Ok(cause) => cause.clone(),
            Err(_) => None,
        };
        match cause {
            Some(cause) => cause,
            None => std::future::pending().await,
        }
    }

    /// A future that resolves once draining begins.
    ///
    /// Hand it to the server's graceful-shutdown hook so it stops accepting
    /// connections and finishes the ones it has.
    pub fn draining(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.cause.subscribe();
        async move {
            let closed = rx.wait_for(Option::is_some).await.is_err();
            if closed {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Waits for a trigger, then gives `server` until the deadline to finish.
    ///
    /// `server` is expected to stop on its own once [`draining`](Self::draining)
    /// resolves (for example an `axum::serve(..).with_graceful_shutdown(..)`
    /// future). The deadline is armed when the trigger fires.
    pub async fn run<F, E>(&self, server: F) -> ShutdownOutcome
    where
        F: Future<Output = Result<(), E>>,
        E: Display,
    {
        tokio::pin!(server);

        let finished = tokio::select! {
            _ = self.triggered() => None,
            result = &mut server => Some(result),
        };

        let result = match finished {
            Some(result) => result,
            None => match tokio::time::timeout_at(self.deadline(), &mut server).await {
                Ok(result) => result,
                Err(_) => return self.deadline_exceeded(),
            },
        };

        match result {
            Ok(()) => self.drained(),
            Err(err) => self.server_failed(err.to_string()),
        }
    }

    /// Like [`run`](Self::run), then exits the process with the outcome's code.
    pub async fn run_and_exit<F, E>(&self, server: F)
    where
        F: Future<Output = Result<(), E>>,
        E: Display,
    {
        let outcome = self.run(server).await;
        let code = outcome.exit_code();
        tracing::info!(coordinator = %self.inner.config.name, code, "exiting");
        std::process::exit(code);
    }

    fn deadline(&self) -> Instant {
        let started = (*self.inner.triggered_at.lock()).unwrap_or_else(Instant::now);
        started + self.inner.config.drain_timeout
    }

    fn drained(&self) -> ShutdownOutcome {
        self.inner.state.terminate();
        let name = &self.inner.config.name;
        let cause = self.cause();
        let elapsed = (*self.inner.triggered_at.lock())
            .map(|at| at.elapsed())
            .unwrap_or_default();

        if cause.is_some() {
            tracing::info!(
                coordinator = %name,
                elapsed_ms = elapsed.as_millis() as u64,
                "drain complete"
            );
            self.inner
                .config
                .event_listeners
                .emit(&ShutdownEvent::Drained {
                    source: name.clone(),
                    timestamp: std::time::Instant::now(),
                    elapsed,
                });
        } else {
            tracing::info!(coordinator = %name, "server stopped without a shutdown trigger");
        }

        ShutdownOutcome::Drained { cause, elapsed }
    }

    fn deadline_exceeded(&self) -> ShutdownOutcome {
        self.inner.state.terminate();
        let config = &self.inner.config;
        tracing::error!(
            coordinator = %config.name,
            timeout_ms = config.drain_timeout.as_millis() as u64,
            "drain deadline exceeded, abandoning in-flight work"
        );
        config.event_listeners.emit(&ShutdownEvent::DeadlineExceeded {
            source: config.name.clone(),
            timestamp: std::time::Instant::now(),
            timeout: config.drain_timeout,
        });

        ShutdownOutcome::DeadlineExceeded {
            cause: self.cause(),
            timeout: config.drain_timeout,
            exit_code: config.forced_exit_code,
        }
    }

    fn server_failed(&self, message: String) -> ShutdownOutcome {
        if !self.is_draining() {
            self.trigger(ShutdownCause::Fatal(message.clone()));
        }
        self.inner.state.terminate();
        tracing::error!(coordinator = %self.inner.config.name, error = %message, "server failed");
        ShutdownOutcome::ServerError {
            cause: self.cause(),
            message,
        }
    }
}

fn upgrade(inner: &Weak<Inner>) -> Option<ShutdownCoordinator> {
    inner.upgrade().map(|inner| ShutdownCoordinator { inner })
}
