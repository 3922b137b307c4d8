//! Persisted license records
//!
//! A [`LicenseRecord`] lives under `licenses/<keyed-id>` and is owned
//! exclusively by the license store. Writes are merges: a [`LicensePatch`]
//! names the fields to replace, `createdAt` survives, `updatedAt` and
//! `updatedBy` are stamped by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Action, Role};

/// Commercial license tier.
///
/// Unknown tier strings are preserved in [`LicenseType::Other`] so a record
/// round-trips unchanged; they evaluate to the `basic` level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LicenseType {
    /// Free tier
    #[default]
    Free,
    /// Basic tier
    Basic,
    /// Professional tier
    Professional,
    /// Enterprise tier
    Enterprise,
    /// Anything the engine does not recognise
    Other(String),
}

impl LicenseType {
    /// Storage spelling.
    pub fn as_str(&self) -> &str {
        match self {
            LicenseType::Free => "free",
            LicenseType::Basic => "basic",
            LicenseType::Professional => "professional",
            LicenseType::Enterprise => "enterprise",
            LicenseType::Other(other) => other,
        }
    }
}

impl From<String> for LicenseType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "free" => LicenseType::Free,
            "basic" => LicenseType::Basic,
            "professional" => LicenseType::Professional,
            "enterprise" => LicenseType::Enterprise,
            _ => LicenseType::Other(value),
        }
    }
}

impl From<LicenseType> for String {
    fn from(value: LicenseType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective license level reported in a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseLevel {
    /// Free and basic tiers, and anything unrecognised
    #[default]
    Basic,
    /// Professional tier
    Professional,
    /// Enterprise tier
    Enterprise,
    /// Administrators, regardless of tier
    Admin,
}

impl LicenseLevel {
    /// Level for a tier held by a role. Administrators always report `admin`.
    pub fn resolve(license_type: &LicenseType, role: Role) -> LicenseLevel {
        if role.is_admin() {
            return LicenseLevel::Admin;
        }
        match license_type {
            LicenseType::Free | LicenseType::Basic => LicenseLevel::Basic,
            LicenseType::Professional => LicenseLevel::Professional,
            LicenseType::Enterprise => LicenseLevel::Enterprise,
            LicenseType::Other(_) => LicenseLevel::Basic,
        }
    }
}

/// Per-license override for one program (resource).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramPermission {
    /// Whether the program is switched on for this license
    #[serde(default)]
    pub enabled: bool,
    /// Action spelling → granted. Aliases are honoured when reading.
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl ProgramPermission {
    /// Explicit value recorded for an action, considering alias spellings.
    /// A `true` under any spelling wins over a `false` under another.
    pub fn explicit(&self, action: Action) -> Option<bool> {
        let mut seen = None;
        for (key, granted) in &self.permissions {
            if Action::parse(key) == Some(action) {
                if *granted {
                    return Some(true);
                }
                seen = Some(false);
            }
        }
        seen
    }

    /// `enabled ∧ permissions[action]`
    pub fn allows(&self, action: Action) -> bool {
        self.enabled && self.explicit(action) == Some(true)
    }

    /// Canonical actions explicitly granted, in enumeration order.
    pub fn granted_actions(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.explicit(*action) == Some(true))
            .collect()
    }
}

/// License document persisted under `licenses/<keyed-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// Author-controlled validity flag
    #[serde(default)]
    pub is_valid: bool,
    /// Tier; `None` marks a malformed record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<LicenseType>,
    /// License-gated feature identifiers
    #[serde(default)]
    pub features: Vec<String>,
    /// `None` means non-expiring
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Fine-grained per-program overrides
    #[serde(default)]
    pub program_permissions: BTreeMap<String, ProgramPermission>,
    /// Informational seat count; never consulted by the engine
    #[serde(default)]
    pub max_users: u32,
    /// Creation timestamp; `None` marks a malformed record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last write timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Principal id of the last writer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl LicenseRecord {
    /// Record written on first contact with a principal that has none.
    pub fn default_free(now: DateTime<Utc>, features: Vec<String>, max_users: u32) -> Self {
        Self {
            is_valid: true,
            license_type: Some(LicenseType::Free),
            features,
            expiry_date: None,
            program_permissions: BTreeMap::new(),
            max_users,
            created_at: Some(now),
            updated_at: Some(now),
            updated_by: None,
        }
    }

    /// Both `createdAt` and `licenseType` are present.
    pub fn is_well_formed(&self) -> bool {
        self.created_at.is_some() && self.license_type.is_some()
    }

    /// Tier, treating a missing one as `free`.
    pub fn tier(&self) -> LicenseType {
        self.license_type.clone().unwrap_or_default()
    }

    /// `expiryDate != null ∧ expiryDate <= now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now)
    }

    /// `isValid ∧ well-formed ∧ not expired`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_valid && self.is_well_formed() && !self.is_expired_at(now)
    }

    /// Merge a patch onto this record. `createdAt` is preserved (or set to
    /// `now` when absent), `updatedAt`/`updatedBy` are replaced.
    pub fn apply(&mut self, patch: LicensePatch, now: DateTime<Utc>, actor: &str) {
        if let Some(is_valid) = patch.is_valid {
            self.is_valid = is_valid;
        }
        if let Some(license_type) = patch.license_type {
            self.license_type = Some(license_type);
        }
        if let Some(features) = patch.features {
            self.features = features;
        }
        if let Some(expiry_date) = patch.expiry_date {
            self.expiry_date = expiry_date;
        }
        if let Some(programs) = patch.program_permissions {
            self.program_permissions = programs;
        }
        if let Some(max_users) = patch.max_users {
            self.max_users = max_users;
        }
        if self.created_at.is_none() {
            self.created_at = patch.created_at.or(Some(now));
        }
        self.updated_at = Some(now);
        self.updated_by = Some(actor.to_string());
    }
}

/// Partial update for a [`LicenseRecord`]. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LicensePatch {
    /// Replace the validity flag
    pub is_valid: Option<bool>,
    /// Replace the tier
    pub license_type: Option<LicenseType>,
    /// Replace the feature list
    pub features: Option<Vec<String>>,
    /// Replace the expiry; `Some(None)` clears it
    pub expiry_date: Option<Option<DateTime<Utc>>>,
    /// Replace the whole program override map
    pub program_permissions: Option<BTreeMap<String, ProgramPermission>>,
    /// Replace the seat count
    pub max_users: Option<u32>,
    /// Creation stamp, used only when the stored record has none
    pub created_at: Option<DateTime<Utc>>,
}

impl LicensePatch {
    /// Patch that only flips validity.
    pub fn validity(is_valid: bool) -> Self {
        Self {
            is_valid: Some(is_valid),
            ..Self::default()
        }
    }
}

impl From<LicenseRecord> for LicensePatch {
    fn from(record: LicenseRecord) -> Self {
        Self {
            is_valid: Some(record.is_valid),
            license_type: record.license_type,
            features: Some(record.features),
            expiry_date: Some(record.expiry_date),
            program_permissions: Some(record.program_permissions),
            max_users: Some(record.max_users),
            created_at: record.created_at,
        }
    }
}
