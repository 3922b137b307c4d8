//! Derived license status
//!
//! A [`LicenseStatus`] is computed on demand from a [`crate::LicenseRecord`]
//! and the principal's role. It is never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Action, LicenseLevel, LicenseType, ProgramPermission, Role};

/// Resource a grant applies to: a named resource or the `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceScope {
    /// `*`
    Any,
    /// A single resource identifier
    Named(String),
}

impl ResourceScope {
    /// Whether this scope covers `resource`.
    pub fn matches(&self, resource: &str) -> bool {
        match self {
            ResourceScope::Any => true,
            ResourceScope::Named(name) => name == resource,
        }
    }
}

impl From<String> for ResourceScope {
    fn from(value: String) -> Self {
        if value == "*" {
            ResourceScope::Any
        } else {
            ResourceScope::Named(value)
        }
    }
}

impl From<&str> for ResourceScope {
    fn from(value: &str) -> Self {
        ResourceScope::from(value.to_string())
    }
}

impl From<ResourceScope> for String {
    fn from(value: ResourceScope) -> Self {
        match value {
            ResourceScope::Any => "*".to_string(),
            ResourceScope::Named(name) => name,
        }
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceScope::Any => f.write_str("*"),
            ResourceScope::Named(name) => f.write_str(name),
        }
    }
}

/// Extra conditions attached to a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantConditions {
    /// Grant originates from a license program override
    pub license_required: bool,
}

/// One entry of the status permission list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Resource scope
    pub resource: ResourceScope,
    /// Granted actions
    pub actions: Vec<Action>,
    /// Optional conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<GrantConditions>,
}

impl PermissionGrant {
    /// Unconditional grant.
    pub fn new(resource: impl Into<ResourceScope>, actions: impl Into<Vec<Action>>) -> Self {
        Self {
            resource: resource.into(),
            actions: actions.into(),
            conditions: None,
        }
    }

    /// Grant that carries `licenseRequired: true`.
    pub fn licensed(resource: impl Into<ResourceScope>, action: Action) -> Self {
        Self {
            resource: resource.into(),
            actions: vec![action],
            conditions: Some(GrantConditions {
                license_required: true,
            }),
        }
    }

    /// Whether this grant covers `action` on `resource`. A grant covering
    /// `edit` also covers `create`.
    pub fn covers(&self, resource: &str, action: Action) -> bool {
        if !self.resource.matches(resource) {
            return false;
        }
        self.actions.contains(&action)
            || (action == Action::Create && self.actions.contains(&Action::Edit))
    }
}

/// Effective license state of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatus {
    /// `record.isValid ∧ (expiry == null ∨ expiry > now)`
    pub is_valid: bool,
    /// Effective level
    pub level: LicenseLevel,
    /// Expiry carried over from the record
    pub expiry_date: Option<DateTime<Utc>>,
    /// Licensed features
    pub features: Vec<String>,
    /// Derived permission list
    pub permissions: Vec<PermissionGrant>,
    /// Tier carried over from the record
    pub license_type: LicenseType,
    /// Informational seat count
    pub max_users: u32,
    /// Role the status was derived for
    pub role: Role,
    /// Program overrides carried over from the record
    #[serde(default)]
    pub programs: BTreeMap<String, ProgramPermission>,
}

impl LicenseStatus {
    /// Minimal status returned whenever evaluation faults. Never cached.
    pub fn pessimistic() -> Self {
        Self {
            is_valid: false,
            level: LicenseLevel::Basic,
            expiry_date: None,
            features: Vec::new(),
            permissions: Vec::new(),
            license_type: LicenseType::Free,
            max_users: 1,
            role: Role::User,
            programs: BTreeMap::new(),
        }
    }

    /// Whether any grant in the permission list covers `(resource, action)`.
    pub fn grants(&self, resource: &str, action: Action) -> bool {
        self.permissions
            .iter()
            .any(|grant| grant.covers(resource, action))
    }

    /// Whether a program override enables `action` on `resource`. An `edit`
    /// entry also satisfies `create`.
    pub fn program_allows(&self, resource: &str, action: Action) -> bool {
        self.programs.get(resource).is_some_and(|program| {
            program.allows(action) || (action == Action::Create && program.allows(Action::Edit))
        })
    }

    /// `feature ∈ features`
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}
