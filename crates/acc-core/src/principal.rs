//! Principals and user directory records
//!
//! Identity establishment is owned by an external collaborator; this module
//! only carries what that collaborator hands over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Role;

/// Which identity provider authenticated the principal.
///
/// Only affects how session loss is reported; it never changes a permission
/// decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Federated OAuth login
    #[default]
    #[serde(rename = "oauth")]
    OAuth,
    /// Magento admin token
    Magento,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::OAuth => f.write_str("oauth"),
            IdentityKind::Magento => f.write_str("magento"),
        }
    }
}

/// An authenticated identity; the subject of permission decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Opaque identifier, sanitized before it touches storage
    pub id: String,
    /// Role asserted at login
    pub role: Role,
    /// Optional human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Identity provider kind
    #[serde(default)]
    pub identity_kind: IdentityKind,
}

impl Principal {
    /// Create a principal authenticated through OAuth.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            display_name: None,
            identity_kind: IdentityKind::OAuth,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the identity kind.
    pub fn with_identity_kind(mut self, kind: IdentityKind) -> Self {
        self.identity_kind = kind;
        self
    }
}

/// Record stored under `users/<keyed-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Authoritative role; unknown strings read back as `viewer`
    #[serde(default)]
    pub role: Role,
    /// First registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Most recent login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    /// Identity provider kind
    #[serde(default)]
    pub identity_kind: IdentityKind,
}

impl UserRecord {
    /// Minimal record for a principal.
    pub fn for_principal(principal: &Principal, now: DateTime<Utc>) -> Self {
        Self {
            email: String::new(),
            display_name: principal.display_name.clone(),
            role: principal.role,
            created_at: Some(now),
            last_login: Some(now),
            identity_kind: principal.identity_kind,
        }
    }
}
