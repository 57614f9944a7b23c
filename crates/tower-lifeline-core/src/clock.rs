//! Wall-clock helpers.
//!
//! Monotonic [`Instant`](std::time::Instant)s cannot survive a restart, so
//! anything that is persisted (queued jobs, for example) is stamped with
//! milliseconds since the Unix epoch instead.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before 1970 yields `0` rather than an error.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns how many milliseconds have passed between `then` and `now`,
/// saturating at zero when `then` lies in the future.
pub fn age_millis(then: u64, now: u64) -> u64 {
    now.saturating_sub(then)
}
