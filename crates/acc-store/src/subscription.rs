//! Watch handles
//!
//! Subscription lifecycle: `Idle → Listening (↺ update) → Detached`.
//! `Detached` is terminal; watching again creates a fresh handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Nothing attached yet
    #[default]
    Idle,
    /// Receiving updates
    Listening,
    /// Torn down; terminal
    Detached,
}

type Detacher = Box<dyn FnOnce() + Send>;

/// Handle returned by [`crate::StorageEffects::watch`]. Detaches on drop.
pub struct WatchHandle {
    key: String,
    detacher: Option<Detacher>,
}

impl WatchHandle {
    /// Handle whose `detacher` runs exactly once, on [`WatchHandle::detach`] or drop.
    pub fn new(key: impl Into<String>, detacher: impl FnOnce() + Send + 'static) -> Self {
        Self {
            key: key.into(),
            detacher: Some(Box::new(detacher)),
        }
    }

    /// Watched key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        if self.detacher.is_some() {
            SubscriptionState::Listening
        } else {
            SubscriptionState::Detached
        }
    }

    /// Stop receiving updates. Idempotent.
    pub fn detach(&mut self) {
        if let Some(detacher) = self.detacher.take() {
            detacher();
            tracing::trace!(key = %self.key, "watch detached");
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn detacher_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut handle = WatchHandle::new("licenses/u1", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.state(), SubscriptionState::Listening);

        handle.detach();
        handle.detach();
        drop(handle);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_detaches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(WatchHandle::new("k", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
