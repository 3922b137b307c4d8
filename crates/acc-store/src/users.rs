//! User directory (`users/<keyed-id>`)

use acc_core::keys::user_key;
use acc_core::{AccessConfig, Result, Role, UserRecord};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{bounded, decode, encode};
use crate::StorageEffects;

/// Read/write access to user records.
#[derive(Clone)]
pub struct UserDirectory {
    storage: Arc<dyn StorageEffects>,
    timeout: Duration,
}

impl UserDirectory {
    /// Create a directory with the default storage timeout.
    pub fn new(storage: Arc<dyn StorageEffects>) -> Self {
        Self {
            storage,
            timeout: AccessConfig::default().storage_timeout(),
        }
    }

    /// Override the per-call storage timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch a user record.
    pub async fn read(&self, id: &str) -> Result<Option<UserRecord>> {
        let key = user_key(id);
        let bytes = bounded("user read", self.timeout, self.storage.retrieve(&key)).await?;
        bytes.map(|bytes| decode(&key, &bytes)).transpose()
    }

    /// Stored role, if the user has a record.
    pub async fn role(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.read(id).await?.map(|record| record.role))
    }

    /// Replace a user record.
    pub async fn put(&self, id: &str, record: &UserRecord) -> Result<()> {
        let key = user_key(id);
        let bytes = encode(&key, record)?;
        bounded("user write", self.timeout, self.storage.store(&key, bytes)).await
    }
}
