//! Storage keyspace
//!
//! The storage layer rejects `. # $ [ ]` inside path segments, so every
//! principal id is passed through [`sanitize`] before it becomes part of a key.

use crate::Action;

/// Prefix for persisted license records.
pub const LICENSES_PREFIX: &str = "licenses/";

/// Prefix for persisted user records.
pub const USERS_PREFIX: &str = "users/";

/// Key of the licensed program catalog.
pub const LICENSED_PROGRAMS_KEY: &str = "system/licensedPrograms";

const FORBIDDEN: [char; 5] = ['.', '#', '$', '[', ']'];

/// Replace every storage-forbidden character with `_`.
///
/// Idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect()
}

/// `licenses/<keyed-id>`
pub fn license_key(id: &str) -> String {
    format!("{LICENSES_PREFIX}{}", sanitize(id))
}

/// `users/<keyed-id>`
pub fn user_key(id: &str) -> String {
    format!("{USERS_PREFIX}{}", sanitize(id))
}

/// License status cache key: `license_<id>`
pub fn license_cache_key(id: &str) -> String {
    format!("license_{id}")
}

/// Decision cache key: `<action>_<resource>`
pub fn decision_cache_key(action: Action, resource: &str) -> String {
    format!("{action}_{resource}")
}
