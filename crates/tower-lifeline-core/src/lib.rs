//! Core infrastructure for tower-lifeline.
//!
//! This crate provides the pieces shared by the circuit breaker, the offline
//! request queue and the shutdown coordinator:
//! - Event system for observability
//! - Wall-clock helpers for persisted timestamps

pub mod clock;
pub mod events;

pub use clock::epoch_millis;
pub use events::{EventListener, EventListeners, FnListener, LifelineEvent};
