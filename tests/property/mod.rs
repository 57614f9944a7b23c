//! Property-based tests for the breaker and the offline queue.

pub mod offline_queue;
