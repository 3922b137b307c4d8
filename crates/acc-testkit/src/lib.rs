//! # ACC Testkit - Layer 8: Testing
//!
//! Shared test infrastructure for the access control crates: a manually
//! driven clock, a fault-injecting storage handler, record and menu fixtures,
//! and opt-in tracing output.
//!
//! ```toml
//! [dev-dependencies]
//! acc-testkit = { path = "../acc-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

/// Manual clock
pub mod clock;
/// Record and menu fixtures
pub mod fixtures;
/// Test log output
pub mod logging;
/// Fault-injecting storage
pub mod storage;

pub use clock::ManualClock;
pub use fixtures::*;
pub use logging::init_test_tracing;
pub use storage::{FlakyStorage, ReadGate};
