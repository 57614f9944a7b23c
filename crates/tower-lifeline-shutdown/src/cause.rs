use std::any::Any;
use std::fmt;

/// What started the shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// A thread panicked; carries the panic message and location.
    Panic(String),
    /// The application reported an unrecoverable error.
    Fatal(String),
}

impl ShutdownCause {
    /// Returns `true` for causes that are errors rather than requests to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShutdownCause::Panic(_) | ShutdownCause::Fatal(_))
    }
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownCause::Interrupt => f.write_str("interrupt signal"),
            ShutdownCause::Terminate => f.write_str("terminate signal"),
            ShutdownCause::Panic(msg) => write!(f, "panic: {msg}"),
            ShutdownCause::Fatal(msg) => write!(f, "fatal error: {msg}"),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send), location: Option<String>) -> String {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("Box<dyn Any>")
    };
    match location {
        Some(at) => format!("{message} at {at}"),
        None => message,
    }
}
