use thiserror::Error;

/// Errors returned by [`ShutdownCoordinator::install`](crate::ShutdownCoordinator::install).
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// An OS signal handler could not be registered.
    #[error("failed to install {signal} handler: {source}")]
    SignalInstall {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// Signal handling needs a tokio runtime and none is running.
    #[error("signal handling requires a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
