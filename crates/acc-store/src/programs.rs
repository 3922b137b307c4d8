//! Licensed program catalog (`system/licensedPrograms`)
//!
//! System-wide defaults for programs that licenses may override per principal.

use acc_core::keys::LICENSED_PROGRAMS_KEY;
use acc_core::{Action, AccessConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{bounded, decode, encode};
use crate::StorageEffects;

/// Catalog entry for one program.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensedProgram {
    /// Enabled for every license unless overridden
    #[serde(default)]
    pub default_enabled: bool,
    /// Human readable name
    #[serde(default)]
    pub display_name: String,
    /// Default action map
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl LicensedProgram {
    /// Default value for `action`, honouring alias spellings.
    pub fn permits(&self, action: Action) -> bool {
        self.permissions
            .iter()
            .any(|(key, granted)| *granted && Action::parse(key) == Some(action))
    }
}

/// Resource id → catalog entry.
pub type LicensedPrograms = BTreeMap<String, LicensedProgram>;

/// Read/write access to the program catalog.
#[derive(Clone)]
pub struct ProgramCatalog {
    storage: Arc<dyn StorageEffects>,
    timeout: Duration,
}

impl ProgramCatalog {
    /// Create a catalog with the default storage timeout.
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

    /// Fetch the catalog; absent reads as empty.
    pub async fn read(&self) -> Result<LicensedPrograms> {
        let bytes = bounded(
            "catalog read",
            self.timeout,
            self.storage.retrieve(LICENSED_PROGRAMS_KEY),
        )
        .await?;
        match bytes {
            Some(bytes) => decode(LICENSED_PROGRAMS_KEY, &bytes),
            None => Ok(LicensedPrograms::new()),
        }
    }

    /// Replace the catalog.
    pub async fn put(&self, programs: &LicensedPrograms) -> Result<()> {
        let bytes = encode(LICENSED_PROGRAMS_KEY, programs)?;
        bounded(
            "catalog write",
            self.timeout,
            self.storage.store(LICENSED_PROGRAMS_KEY, bytes),
        )
        .await
    }
}
