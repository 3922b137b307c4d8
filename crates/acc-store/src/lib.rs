//! # ACC Store - Layer 2: Storage
//!
//! **Purpose**: Own every persisted document the access control core touches.
//!
//! # Architecture Constraints
//!
//! **Layer 2 depends only on acc-core** (foundation).
//! - YES keyspace effect interface (`StorageEffects`) and an in-memory handler
//! - YES typed stores over that keyspace, with key sanitization at every boundary
//! - YES change subscriptions on individual keys
//! - NO interpretation of record fields (that's `acc-authorization`)
//!
//! ## Keyspace
//!
//! - `users/<keyed-id>` → [`acc_core::UserRecord`]
//! - `licenses/<keyed-id>` → [`acc_core::LicenseRecord`]
//! - `system/licensedPrograms` → [`LicensedPrograms`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;

/// Keyspace effect interface
pub mod effects;

/// Unified storage error types
pub mod errors;

/// Typed license record store
pub mod license_store;

/// In-memory keyspace handler
pub mod memory;

/// Licensed program catalog
pub mod programs;

/// Watch handles and subscription state
pub mod subscription;

/// User directory
pub mod users;

pub use effects::{KeyListener, StorageEffects};
pub use errors::StorageError;
pub use license_store::{LicenseChange, LicenseListener, LicenseStore, LicenseSubscription};
pub use memory::MemoryStorageHandler;
pub use programs::{LicensedProgram, LicensedPrograms, ProgramCatalog};
pub use subscription::{SubscriptionState, WatchHandle};
pub use users::UserDirectory;
