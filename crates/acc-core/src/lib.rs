//! # ACC Core - Layer 1: Foundation
//!
//! **Purpose**: Define the vocabulary every other access-control crate speaks.
//!
//! This crate provides the role lattice, the closed action set, principal and
//! license data types, storage key sanitization, the unified error type and the
//! clock effect used for every TTL and expiry computation.
//!
//! # Architecture Constraints
//!
//! - YES pure data types and pure functions
//! - YES effect *interfaces* (`ClockEffects`)
//! - NO storage access (that's `acc-store`)
//! - NO caching or decision logic (that's `acc-authorization`)
//!
//! ## Core Concepts
//!
//! - **Role lattice**: `viewer < user < manager < admin < super_admin`, frozen at
//!   compile time. Adding a role is a change to [`role`] only.
//! - **Actions**: `view`, `edit`, `create`, `delete`, `manage_users`,
//!   `assign_roles`. The aliases `read`, `update` and `add` collapse at parse time.
//! - **License record**: the persisted per-principal license document.
//! - **License status**: the derived, ephemeral view the engine decides against.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Closed action set and alias collapsing
pub mod action;

/// Per-resource capability sets
pub mod capability;

/// Engine configuration
pub mod config;

/// Clock effect interface
pub mod effects;

/// Unified error handling
pub mod errors;

/// Storage keyspace and cache key helpers
pub mod keys;

/// Persisted license records and patches
pub mod license;

/// Authenticated principals and user directory records
pub mod principal;

/// Role lattice
pub mod role;

/// Derived license status and permission grants
pub mod status;

pub use action::Action;
pub use capability::{AccessLevel, CapabilityOverrides, CapabilitySet, LicenseCapabilityMask};
pub use config::{AccessConfig, ConfigValidation};
pub use effects::{ClockEffects, SystemClock};
pub use errors::{AccError, Result};
pub use keys::sanitize;
pub use license::{LicenseLevel, LicensePatch, LicenseRecord, LicenseType, ProgramPermission};
pub use principal::{IdentityKind, Principal, UserRecord};
pub use role::{Role, RoleCapabilities};
pub use status::{GrantConditions, LicenseStatus, PermissionGrant, ResourceScope};
