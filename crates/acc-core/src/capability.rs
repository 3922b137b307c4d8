//! Per-resource capability sets
//!
//! Effective capabilities are layered, later layers overriding earlier ones:
//! `DEFAULT → base → overrides → license mask`.

use serde::{Deserialize, Serialize};

use crate::{Action, ProgramPermission};

/// Coarse level tag carried by a capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No access
    #[default]
    None,
    /// Read-only surfaces
    Read,
    /// Editable surfaces
    Write,
    /// Surfaces that allow deletion
    Delete,
    /// Administrative surfaces
    Admin,
    /// Super-administrator surfaces
    SuperAdmin,
}

/// Capability flags for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySet {
    /// May open the surface
    pub can_view: bool,
    /// May read records
    pub can_read: bool,
    /// May create records
    pub can_create: bool,
    /// May edit records
    pub can_edit: bool,
    /// May delete records
    pub can_delete: bool,
    /// May export
    pub can_export: bool,
    /// May import
    pub can_import: bool,
    /// May bulk-edit
    pub can_bulk_edit: bool,
    /// May manage the resource itself
    pub can_manage: bool,
    /// Level tag
    pub level: AccessLevel,
}

impl CapabilitySet {
    /// Fail-closed starting point: nothing granted.
    pub const DEFAULT: CapabilitySet = CapabilitySet {
        can_view: false,
        can_read: false,
        can_create: false,
        can_edit: false,
        can_delete: false,
        can_export: false,
        can_import: false,
        can_bulk_edit: false,
        can_manage: false,
        level: AccessLevel::None,
    };

    /// Viewing and reading.
    pub const fn read_only() -> Self {
        CapabilitySet {
            can_view: true,
            can_read: true,
            can_export: true,
            level: AccessLevel::Read,
            ..Self::DEFAULT
        }
    }

    /// Read plus create, edit, import and bulk edit.
    pub const fn writable() -> Self {
        CapabilitySet {
            can_view: true,
            can_read: true,
            can_create: true,
            can_edit: true,
            can_export: true,
            can_import: true,
            can_bulk_edit: true,
            level: AccessLevel::Write,
            ..Self::DEFAULT
        }
    }

    /// Writable plus delete.
    pub const fn deletable() -> Self {
        CapabilitySet {
            can_delete: true,
            level: AccessLevel::Delete,
            ..Self::writable()
        }
    }

    /// Every flag set, tagged with `level`.
    pub const fn full(level: AccessLevel) -> Self {
        CapabilitySet {
            can_view: true,
            can_read: true,
            can_create: true,
            can_edit: true,
            can_delete: true,
            can_export: true,
            can_import: true,
            can_bulk_edit: true,
            can_manage: true,
            level,
        }
    }

    /// Apply caller-supplied overrides.
    pub fn with_overrides(mut self, overrides: &CapabilityOverrides) -> Self {
        let CapabilityOverrides {
            can_view,
            can_read,
            can_create,
            can_edit,
            can_delete,
            can_export,
            can_import,
            can_bulk_edit,
            can_manage,
            level,
        } = *overrides;
        let pairs = [
            (&mut self.can_view, can_view),
            (&mut self.can_read, can_read),
            (&mut self.can_create, can_create),
            (&mut self.can_edit, can_edit),
            (&mut self.can_delete, can_delete),
            (&mut self.can_export, can_export),
            (&mut self.can_import, can_import),
            (&mut self.can_bulk_edit, can_bulk_edit),
            (&mut self.can_manage, can_manage),
        ];
        for (slot, value) in pairs {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(level) = level {
            self.level = level;
        }
        self
    }

    /// AND read/edit/delete with the mask, only where the mask is an explicit `false`.
    pub fn with_mask(mut self, mask: &LicenseCapabilityMask) -> Self {
        if mask.can_read == Some(false) {
            self.can_read = false;
        }
        if mask.can_edit == Some(false) {
            self.can_edit = false;
        }
        if mask.can_delete == Some(false) {
            self.can_delete = false;
        }
        self
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Optional per-flag overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityOverrides {
    /// Override `can_view`
    pub can_view: Option<bool>,
    /// Override `can_read`
    pub can_read: Option<bool>,
    /// Override `can_create`
    pub can_create: Option<bool>,
    /// Override `can_edit`
    pub can_edit: Option<bool>,
    /// Override `can_delete`
    pub can_delete: Option<bool>,
    /// Override `can_export`
    pub can_export: Option<bool>,
    /// Override `can_import`
    pub can_import: Option<bool>,
    /// Override `can_bulk_edit`
    pub can_bulk_edit: Option<bool>,
    /// Override `can_manage`
    pub can_manage: Option<bool>,
    /// Override the level tag
    pub level: Option<AccessLevel>,
}

/// License-derived restrictions. Only explicit `false` values restrict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseCapabilityMask {
    /// License-level read flag
    pub can_read: Option<bool>,
    /// License-level edit flag
    pub can_edit: Option<bool>,
    /// License-level delete flag
    pub can_delete: Option<bool>,
}

impl LicenseCapabilityMask {
    /// Mask from a program override's explicit permission values.
    pub fn from_program(program: &ProgramPermission) -> Self {
        Self {
            can_read: program.explicit(Action::View),
            can_edit: program.explicit(Action::Edit),
            can_delete: program.explicit(Action::Delete),
        }
    }

    /// Mask that withdraws read, edit and delete.
    pub const fn denied() -> Self {
        Self {
            can_read: Some(false),
            can_edit: Some(false),
            can_delete: Some(false),
        }
    }
}
