//! Shared harness for access control integration tests.

#![allow(dead_code)]

use acc_authorization::AccessControl;
use acc_core::{AccessConfig, ClockEffects};
use acc_store::{LicenseStore, MemoryStorageHandler, StorageEffects};
use acc_testkit::{FlakyStorage, ManualClock};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct Harness {
    pub storage: MemoryStorageHandler,
    pub clock: ManualClock,
    pub access: AccessControl,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AccessConfig::default())
    }

    pub fn with_config(config: AccessConfig) -> Self {
        acc_testkit::init_test_tracing();
        let storage = MemoryStorageHandler::new();
        let clock = ManualClock::new();
        let access = AccessControl::new(Arc::new(storage.clone()), Arc::new(clock.clone()), config);
        Self {
            storage,
            clock,
            access,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// License store acting as an out-of-band writer.
    pub fn external_writer(&self) -> LicenseStore {
        let storage: Arc<dyn StorageEffects> = Arc::new(self.storage.clone());
        let clock: Arc<dyn ClockEffects> = Arc::new(self.clock.clone());
        LicenseStore::new(storage, clock)
    }
}

pub struct FlakyHarness {
    pub storage: FlakyStorage,
    pub clock: ManualClock,
    pub access: AccessControl,
}

impl FlakyHarness {
    pub fn with_config(config: AccessConfig) -> Self {
        acc_testkit::init_test_tracing();
        let storage = FlakyStorage::new();
        let clock = ManualClock::new();
        let access = AccessControl::new(Arc::new(storage.clone()), Arc::new(clock.clone()), config);
        Self {
            storage,
            clock,
            access,
        }
    }

    pub fn new() -> Self {
        Self::with_config(AccessConfig::default())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// License store writing past the fault injection.
    pub fn external_writer(&self) -> LicenseStore {
        let storage: Arc<dyn StorageEffects> = Arc::new(self.storage.inner().clone());
        let clock: Arc<dyn ClockEffects> = Arc::new(self.clock.clone());
        LicenseStore::new(storage, clock)
    }
}
