//! Clock effect interface
//!
//! Every TTL, expiry and `updatedAt` computation asks a [`ClockEffects`]
//! implementation for the current instant instead of reading the system clock
//! directly, so tests can move time deterministically.
//!
//! The interface is synchronous on purpose: decision-cache lookups run on the
//! synchronous hot path and must not suspend.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of wall-clock time.
pub trait ClockEffects: Send + Sync {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self
    }
}

impl ClockEffects for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Blanket implementation for Arc<T> where T: ClockEffects
impl<T: ClockEffects + ?Sized> ClockEffects for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
