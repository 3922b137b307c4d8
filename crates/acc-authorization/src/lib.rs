//! # ACC Authorization - Layer 3: Decisions
//!
//! **Purpose**: Turn license records, roles and the resource registry into
//! permission decisions, capability sets and filtered navigation trees.
//!
//! # Architecture Constraints
//!
//! **Layer 3 depends on acc-core and acc-store.**
//! - YES license status derivation and its cache
//! - YES the decision function, its cache and permission summaries
//! - YES the static resource registry and menu projection
//! - YES live invalidation from license record changes
//! - NO persistence of its own (all records go through `acc-store`)
//! - NO error escapes from decision or projection APIs; only privileged
//!   writes return `Result`
//!
//! ## Scheduling
//!
//! Storage reads, writes and the first status derivation are async. Once a
//! status is resolved, decisions, summaries and menu projection are
//! synchronous and never suspend. Cache and session state sit behind
//! `parking_lot` locks that are never held across an `.await`.
//!
//! ```rust,ignore
//! let access = AccessControl::new(storage, clock, AccessConfig::default());
//! access.initialize(Principal::new("u2", Role::User)).await;
//! assert!(access.has_permission("read", "Dashboard").await);
//! let menu = access.project_menu(&tree);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Access control facade
pub mod control;

/// Error handling
pub mod errors;

/// License status evaluation
pub mod evaluator;

/// Menu projection
pub mod menu;

/// Status observers
pub mod notify;

/// Permission engine
pub mod permissions;

/// Resource registry
pub mod registry;

pub use control::{AccessControl, ProgramAccess, ProgramSource};
pub use errors::{AccError, AuthorizationResult};
pub use evaluator::{Evaluation, LicenseEvaluator};
pub use menu::MenuItem;
pub use notify::{ObserverHandle, ObserverSet, StatusObserver};
pub use permissions::{
    derive_grants, PermissionEngine, PermissionSummary, Subject, SummaryPermissions,
};
pub use registry::{ResourceConfig, ResourceRegistry, DEFAULT_MAX_ROWS};
