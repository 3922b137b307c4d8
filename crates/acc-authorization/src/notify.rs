//! Status observers
//!
//! Observers registered on the engine receive every new [`LicenseStatus`]
//! after the caches have been invalidated. Callbacks run with no engine lock
//! held, so they may query the engine.

use acc_core::LicenseStatus;
use acc_store::SubscriptionState;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback receiving each new status.
pub type StatusObserver = Arc<dyn Fn(&LicenseStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: Vec<(u64, StatusObserver)>,
}

/// Set of status observers.
#[derive(Clone, Default)]
pub struct ObserverSet {
    inner: Arc<Mutex<Registry>>,
}

impl ObserverSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer`. It stays registered until the handle is
    /// unsubscribed or dropped.
    pub fn subscribe(&self, observer: StatusObserver) -> ObserverHandle {
        let mut registry = self.inner.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.push((id, observer));
        ObserverHandle {
            id,
            set: Arc::downgrade(&self.inner),
            state: SubscriptionState::Listening,
        }
    }

    /// Deliver `status` to every observer registered at call time.
    pub fn notify(&self, status: &LicenseStatus) {
        let snapshot: Vec<StatusObserver> = self
            .inner
            .lock()
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        tracing::debug!(observers = snapshot.len(), "notifying status observers");
        for observer in snapshot {
            observer(status);
        }
    }

    /// Registered observer count.
    pub fn len(&self) -> usize {
        self.inner.lock().observers.len()
    }

    /// No observers registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.len())
            .finish()
    }
}

/// Registration of one observer.
#[derive(Debug)]
pub struct ObserverHandle {
    id: u64,
    set: Weak<Mutex<Registry>>,
    state: SubscriptionState,
}

impl ObserverHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Stop receiving statuses. Idempotent.
    pub fn unsubscribe(&mut self) {
        if self.state == SubscriptionState::Detached {
            return;
        }
        if let Some(set) = self.set.upgrade() {
            set.lock().observers.retain(|(id, _)| *id != self.id);
        }
        self.state = SubscriptionState::Detached;
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
