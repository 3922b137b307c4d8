//! Typed license record store
//!
//! Sole writer of `licenses/<keyed-id>`. Reads never interpret fields; writes
//! merge a [`LicensePatch`] onto whatever is stored.

use acc_core::keys::license_key;
use acc_core::{AccError, AccessConfig, ClockEffects, LicensePatch, LicenseRecord, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{bounded, decode, encode};
use crate::{KeyListener, StorageEffects, SubscriptionState, WatchHandle};

/// One delivery from a license subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseChange {
    /// The stored record, decoded
    Updated(LicenseRecord),
    /// A document is stored but does not decode as a license record
    Malformed,
    /// No document is stored any more
    Removed,
}

impl LicenseChange {
    /// Decoded record, if any.
    pub fn record(&self) -> Option<&LicenseRecord> {
        match self {
            LicenseChange::Updated(record) => Some(record),
            LicenseChange::Malformed | LicenseChange::Removed => None,
        }
    }
}

/// Callback invoked after every change to a principal's license document.
pub type LicenseListener = Arc<dyn Fn(LicenseChange) + Send + Sync>;

/// License record store over a keyspace handler.
#[derive(Clone)]
pub struct LicenseStore {
    storage: Arc<dyn StorageEffects>,
    clock: Arc<dyn ClockEffects>,
    timeout: Duration,
}

impl LicenseStore {
    /// Create a store with the default storage timeout.
    pub fn new(storage: Arc<dyn StorageEffects>, clock: Arc<dyn ClockEffects>) -> Self {
        Self {
            storage,
            clock,
            timeout: AccessConfig::default().storage_timeout(),
        }
    }

    /// Override the per-call storage timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Single-shot read. Storage and decode failures are logged and read as
    /// "no record".
    pub async fn read(&self, id: &str) -> Option<LicenseRecord> {
        match self.try_read(id).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(principal = %id, error = %err, "license read failed");
                None
            }
        }
    }

    /// Read that keeps storage failures distinct from an absent record.
    pub async fn try_read(&self, id: &str) -> Result<Option<LicenseRecord>> {
        let key = license_key(id);
        let bytes = bounded("license read", self.timeout, self.storage.retrieve(&key)).await?;
        match bytes {
            Some(bytes) => decode(&key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Merge `patch` onto the stored record (or an empty one), preserving
    /// `createdAt` and stamping `updatedAt`/`updatedBy`. Returns the record as
    /// written.
    pub async fn write(
        &self,
        id: &str,
        patch: LicensePatch,
        actor: &str,
    ) -> Result<LicenseRecord> {
        let key = license_key(id);
        let mut record = match self.try_read(id).await {
            Ok(existing) => existing.unwrap_or_default(),
            Err(AccError::MalformedRecord { message, .. }) => {
                tracing::warn!(%key, %message, "overwriting malformed license record");
                LicenseRecord::default()
            }
            Err(err) => return Err(err),
        };
        record.apply(patch, self.clock.now(), actor);

        let bytes = encode(&key, &record)?;
        bounded("license write", self.timeout, self.storage.store(&key, bytes)).await?;
        tracing::debug!(%key, actor, "license record written");
        Ok(record)
    }

    /// Watch a principal's record. The listener sees the current record (if
    /// any) before this returns, then every subsequent change.
    pub async fn subscribe(&self, id: &str, listener: LicenseListener) -> Result<LicenseSubscription> {
        let key = license_key(id);
        let decode_key = key.clone();
        let on_change: KeyListener = Arc::new(move |bytes: Option<&[u8]>| {
            let change = match bytes.map(|bytes| decode::<LicenseRecord>(&decode_key, bytes)) {
                Some(Ok(record)) => LicenseChange::Updated(record),
                Some(Err(err)) => {
                    tracing::warn!(key = %decode_key, error = %err, "undecodable license update");
                    LicenseChange::Malformed
                }
                None => LicenseChange::Removed,
            };
            listener(change);
        });
        let handle = bounded("license watch", self.timeout, self.storage.watch(&key, on_change)).await?;
        tracing::debug!(%key, "license subscription attached");
        Ok(LicenseSubscription {
            principal: id.to_string(),
            handle,
        })
    }
}

impl fmt::Debug for LicenseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Live subscription to one principal's license record.
#[derive(Debug)]
pub struct LicenseSubscription {
    principal: String,
    handle: WatchHandle,
}

impl LicenseSubscription {
    /// Principal whose record is watched.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.handle.state()
    }

    /// Stop receiving updates. Idempotent; also happens on drop.
    pub fn unsubscribe(&mut self) {
        self.handle.detach();
    }
}
