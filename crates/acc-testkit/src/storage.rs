//! Fault-injecting storage handler
//!
//! Wraps a [`MemoryStorageHandler`] and fails, delays or holds calls on
//! demand, so tests can drive the engine's pessimistic paths and interleave
//! a read with concurrent writes.

use acc_store::{KeyListener, MemoryStorageHandler, StorageEffects, StorageError, WatchHandle};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Faults {
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    delay: Mutex<Option<Duration>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    gate: Mutex<Option<(String, Arc<ReadGate>)>>,
}

/// One-shot hold on a read: the read takes its value, signals `entered`
/// and waits for `release` before returning it.
#[derive(Debug, Default)]
pub struct ReadGate {
    entered: Notify,
    release: Notify,
}

impl ReadGate {
    /// Wait until the held read has taken its value.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held read return.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Storage that can be told to fail or stall.
#[derive(Debug, Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorageHandler,
    faults: Arc<Faults>,
}

impl FlakyStorage {
    /// Healthy storage over an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Healthy storage over an existing handler.
    pub fn wrap(inner: MemoryStorageHandler) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    /// Underlying handler, bypassing fault injection.
    pub fn inner(&self) -> &MemoryStorageHandler {
        &self.inner
    }

    /// Make every read (and watch) fail.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sleep before every call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.faults.delay.lock() = delay;
    }

    /// Hold the next read of `key` until the returned gate is released.
    pub fn hold_next_read(&self, key: impl Into<String>) -> Arc<ReadGate> {
        let gate = Arc::new(ReadGate::default());
        *self.faults.gate.lock() = Some((key.into(), gate.clone()));
        gate
    }

    /// Reads attempted so far.
    pub fn read_count(&self) -> usize {
        self.faults.reads.load(Ordering::SeqCst)
    }

    /// Writes attempted so far.
    pub fn write_count(&self) -> usize {
        self.faults.writes.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        let delay = *self.faults.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn before_read(&self) -> Result<(), StorageError> {
        self.faults.reads.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("injected read failure"));
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<(), StorageError> {
        self.faults.writes.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.faults.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageEffects for FlakyStorage {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.before_write().await?;
        self.inner.store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.before_read().await?;
        let value = self.inner.retrieve(key).await?;
        let gate = {
            let mut slot = self.faults.gate.lock();
            match slot.as_ref() {
                Some((held, _)) if held == key => slot.take().map(|(_, gate)| gate),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(value)
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.before_write().await?;
        self.inner.remove(key).await
    }

    async fn watch(&self, key: &str, listener: KeyListener) -> Result<WatchHandle, StorageError> {
        self.before_read().await?;
        self.inner.watch(key, listener).await
    }
}
