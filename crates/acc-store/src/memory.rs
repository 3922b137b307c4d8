//! In-memory keyspace handler
//!
//! Shared-state handler used by tests and single-process deployments. Clones
//! share the same keyspace and watcher registry.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

use crate::{KeyListener, StorageEffects, StorageError, WatchHandle};

type WatcherMap = HashMap<String, Vec<(u64, KeyListener)>>;

/// In-memory storage handler
#[derive(Clone)]
pub struct MemoryStorageHandler {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    watchers: Arc<Mutex<WatcherMap>>,
    next_watch_id: Arc<AtomicU64>,
}

impl Default for MemoryStorageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorageHandler {
    /// Create a new, empty memory storage handler
    pub fn new() -> Self {
        Self::with_data(HashMap::new())
    }

    /// Create with initial data
    pub fn with_data(data: HashMap<String, Vec<u8>>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            watchers: Arc::new(Mutex::new(HashMap::new())),
            next_watch_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of live watchers on `key`
    pub fn watcher_count(&self, key: &str) -> usize {
        self.watchers.lock().get(key).map_or(0, Vec::len)
    }

    /// Invoke every watcher of `key`. Called with no lock held so listeners
    /// may re-enter the handler.
    fn notify(&self, key: &str, value: Option<&[u8]>) {
        let listeners: Vec<KeyListener> = self
            .watchers
            .lock()
            .get(key)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        if !listeners.is_empty() {
            tracing::trace!(key, watchers = listeners.len(), "delivering change");
        }
        for listener in listeners {
            listener(value);
        }
    }

    fn unregister(watchers: &Weak<Mutex<WatcherMap>>, key: &str, id: u64) {
        let Some(watchers) = watchers.upgrade() else {
            return;
        };
        let mut map = watchers.lock();
        if let Some(entries) = map.get_mut(key) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                map.remove(key);
            }
        }
    }
}

impl fmt::Debug for MemoryStorageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorageHandler")
            .field("watched_keys", &self.watchers.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageEffects for MemoryStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        {
            let mut data = self.data.write().await;
            data.insert(key.to_string(), value.clone());
        }
        self.notify(key, Some(&value));
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let existed = {
            let mut data = self.data.write().await;
            data.remove(key).is_some()
        };
        if existed {
            self.notify(key, None);
        }
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }

    async fn watch(&self, key: &str, listener: KeyListener) -> Result<WatchHandle, StorageError> {
        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        self.watchers
            .lock()
            .entry(key.to_string())
            .or_default()
            .push((id, listener.clone()));

        let current = self.retrieve(key).await?;
        if let Some(value) = current.as_deref() {
            listener(Some(value));
        }

        let registry = Arc::downgrade(&self.watchers);
        let watched = key.to_string();
        Ok(WatchHandle::new(key, move || {
            Self::unregister(&registry, &watched, id);
        }))
    }
}
