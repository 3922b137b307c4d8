//! Role lattice
//!
//! Roles form a strict total order with explicit numeric ranks:
//! `viewer(0) < user(1) < manager(2) < admin(3) < super_admin(4)`.
//!
//! The variant declaration order *is* the lattice order, so the derived `Ord`
//! agrees with [`Role::rank`]. Role strings coming from storage are parsed
//! leniently: anything unrecognised collapses to [`Role::Viewer`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Action;

/// Position of a principal in the role lattice.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Role {
    /// Read-only access
    #[default]
    Viewer,
    /// Standard user: read and edit
    User,
    /// Manager: read, edit and delete
    Manager,
    /// Administrator: every action, bypasses license gates
    Admin,
    /// Super administrator: administrator plus license management
    SuperAdmin,
}

impl Role {
    /// Every role, lowest rank first.
    pub const ALL: [Role; 5] = [
        Role::Viewer,
        Role::User,
        Role::Manager,
        Role::Admin,
        Role::SuperAdmin,
    ];

    /// Numeric rank of this role.
    pub const fn rank(self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::User => 1,
            Role::Manager => 2,
            Role::Admin => 3,
            Role::SuperAdmin => 4,
        }
    }

    /// `rank(self) >= rank(required)`
    pub const fn at_least(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Administrators and super administrators bypass license gates.
    pub const fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// Canonical storage spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Parse a role string, mapping unknown values to [`Role::Viewer`].
    pub fn parse_lossy(value: &str) -> Role {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "manager" => Role::Manager,
            "admin" => Role::Admin,
            "super_admin" => Role::SuperAdmin,
            "viewer" => Role::Viewer,
            other => {
                tracing::debug!(role = other, "unknown role string, treating as viewer");
                Role::Viewer
            }
        }
    }

    /// Coarse capability table used by the decision function.
    pub const fn capabilities(self) -> RoleCapabilities {
        match self {
            Role::Admin | Role::SuperAdmin => RoleCapabilities {
                can_read: true,
                can_edit: true,
                can_delete: true,
                can_manage_users: true,
                can_assign_roles: true,
            },
            Role::Manager => RoleCapabilities {
                can_read: true,
                can_edit: true,
                can_delete: true,
                can_manage_users: false,
                can_assign_roles: false,
            },
            Role::User => RoleCapabilities {
                can_read: true,
                can_edit: true,
                can_delete: false,
                can_manage_users: false,
                can_assign_roles: false,
            },
            Role::Viewer => RoleCapabilities {
                can_read: true,
                can_edit: false,
                can_delete: false,
                can_manage_users: false,
                can_assign_roles: false,
            },
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse_lossy(&value)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::parse_lossy(value)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse action rights granted by a role regardless of resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCapabilities {
    /// `view` / `read`
    pub can_read: bool,
    /// `edit` / `update` / `create` / `add`
    pub can_edit: bool,
    /// `delete`
    pub can_delete: bool,
    /// `manage_users`
    pub can_manage_users: bool,
    /// `assign_roles`
    pub can_assign_roles: bool,
}

impl RoleCapabilities {
    /// Coarse right for `action`; `create` rides on `can_edit`.
    pub const fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_read,
            Action::Edit | Action::Create => self.can_edit,
            Action::Delete => self.can_delete,
            Action::ManageUsers => self.can_manage_users,
            Action::AssignRoles => self.can_assign_roles,
        }
    }
}
