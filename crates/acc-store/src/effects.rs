//! Keyspace effect interface
//!
//! A flat string-keyed byte store with per-key change notification. Typed
//! stores in this crate layer JSON documents on top of it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{StorageError, WatchHandle};

/// Callback invoked with the new value of a watched key (`None` once removed).
pub type KeyListener = Arc<dyn Fn(Option<&[u8]>) + Send + Sync>;

/// Keyspace operations.
///
/// Writes are last-writer-wins; handlers never attempt compare-and-set.
#[async_trait]
pub trait StorageEffects: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Fetch the value under `key`.
    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove `key`. Returns whether a value existed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// Whether `key` holds a value.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.retrieve(key).await?.is_some())
    }

    /// Watch `key`. The listener is invoked with the current value (if any)
    /// before this call returns, then after every committed change, until the
    /// returned handle is detached or dropped.
    async fn watch(&self, key: &str, listener: KeyListener) -> Result<WatchHandle, StorageError>;
}

/// Blanket implementation for Arc<T> where T: StorageEffects
#[async_trait]
impl<T: StorageEffects + ?Sized> StorageEffects for Arc<T> {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        (**self).store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).retrieve(key).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn watch(&self, key: &str, listener: KeyListener) -> Result<WatchHandle, StorageError> {
        (**self).watch(key, listener).await
    }
}
