use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`ShutdownCoordinator`](crate::ShutdownCoordinator).
///
/// Moves forward only: `Running → Draining → Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Serving normally.
    Running,
    /// A trigger fired; in-flight work is finishing under the deadline.
    Draining,
    /// The drain finished or the deadline passed.
    Terminated,
}

impl ShutdownState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ShutdownState::Running,
            1 => ShutdownState::Draining,
            _ => ShutdownState::Terminated,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ShutdownState::Running => "running",
            ShutdownState::Draining => "draining",
            ShutdownState::Terminated => "terminated",
        }
    }
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ShutdownState::Running as u8))
    }

    pub(crate) fn get(&self) -> ShutdownState {
        ShutdownState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `Running → Draining`. Only the first caller wins.
    pub(crate) fn begin_draining(&self) -> Result<(), ShutdownState> {
        self.0
            .compare_exchange(
                ShutdownState::Running as u8,
                ShutdownState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(ShutdownState::from_u8)
    }

    pub(crate) fn terminate(&self) {
        self.0
            .store(ShutdownState::Terminated as u8, Ordering::Release);
    }
}
