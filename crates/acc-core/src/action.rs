//! Closed action set
//!
//! The engine recognises six canonical verbs. Three legacy spellings are
//! accepted at the boundary and collapse onto their canonical form:
//! `read → view`, `update → edit`, `add → create`. Once parsed, no code path
//! can tell an alias from its canonical action.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AccError;

/// Canonical action identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// View or read a resource
    View,
    /// Modify an existing entry
    Edit,
    /// Create a new entry (coarsened onto `edit` for non-admins)
    Create,
    /// Remove an entry
    Delete,
    /// Manage user accounts
    ManageUsers,
    /// Change role assignments
    AssignRoles,
}

impl Action {
    /// Every canonical action, in enumeration order.
    pub const ALL: [Action; 6] = [
        Action::View,
        Action::Edit,
        Action::Create,
        Action::Delete,
        Action::ManageUsers,
        Action::AssignRoles,
    ];

    /// Parse an action or one of its aliases. Returns `None` for verbs outside
    /// the closed set.
    pub fn parse(value: &str) -> Option<Action> {
        match value.trim().to_ascii_lowercase().as_str() {
            "view" | "read" => Some(Action::View),
            "edit" | "update" => Some(Action::Edit),
            "create" | "add" => Some(Action::Create),
            "delete" => Some(Action::Delete),
            "manage_users" => Some(Action::ManageUsers),
            "assign_roles" => Some(Action::AssignRoles),
            _ => None,
        }
    }

    /// Canonical spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::Create => "create",
            Action::Delete => "delete",
            Action::ManageUsers => "manage_users",
            Action::AssignRoles => "assign_roles",
        }
    }
}

impl FromStr for Action {
    type Err = AccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::parse(s).ok_or_else(|| AccError::invalid(format!("unknown action '{s}'")))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
