//! Menu projection
//!
//! Depth-first filter of a navigation tree against the last resolved license
//! status. A node is dropped only by its own gates; losing every child does
//! not drop the parent. Surviving nodes keep their input order.

use acc_core::{Action, LicenseStatus, Role};
use serde::{Deserialize, Serialize};

/// One navigation entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Stable identifier
    pub id: String,
    /// Display label
    pub label: String,
    /// Route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Nested entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
    /// Lowest role that sees the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_required: Option<Role>,
    /// Entry requires a valid license (admins exempt)
    #[serde(default)]
    pub license_required: bool,
    /// `"action:resource"` strings; any one suffices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// License feature the entry depends on (admins exempt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
}

impl MenuItem {
    /// Ungated leaf.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Self::default()
        }
    }

    /// Set the route.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach children.
    pub fn with_children(mut self, children: Vec<MenuItem>) -> Self {
        self.children = children;
        self
    }

    /// Require a minimum role.
    pub fn requires_role(mut self, role: Role) -> Self {
        self.role_required = Some(role);
        self
    }

    /// Require a valid license.
    pub fn requires_license(mut self) -> Self {
        self.license_required = true;
        self
    }

    /// Add an `"action:resource"` alternative.
    pub fn requires_permission(mut self, action: Action, resource: &str) -> Self {
        self.permissions.push(format!("{action}:{resource}"));
        self
    }

    /// Require a license feature.
    pub fn requires_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature_id = Some(feature.into());
        self
    }
}

/// Split `"action:resource"`. Unknown actions and strings without a
/// separator yield `None`.
pub fn parse_permission(entry: &str) -> Option<(Action, &str)> {
    let (action, resource) = entry.split_once(':')?;
    Some((Action::parse(action.trim())?, resource.trim()))
}

/// Project `items` for the holder of `status`. Without a status the result
/// is empty. `may` answers the per-entry permission checks.
pub fn project<F>(items: &[MenuItem], status: Option<&LicenseStatus>, may: F) -> Vec<MenuItem>
where
    F: Fn(Action, &str) -> bool,
{
    match status {
        Some(status) => project_level(items, status, &may),
        None => Vec::new(),
    }
}

fn project_level<F>(items: &[MenuItem], status: &LicenseStatus, may: &F) -> Vec<MenuItem>
where
    F: Fn(Action, &str) -> bool,
{
    items
        .iter()
        .filter(|item| keep(item, status, may))
        .map(|item| MenuItem {
            children: project_level(&item.children, status, may),
            ..item.clone()
        })
        .collect()
}

fn keep<F>(item: &MenuItem, status: &LicenseStatus, may: &F) -> bool
where
    F: Fn(Action, &str) -> bool,
{
    let role = status.role;
    let admin = role.is_admin();

    if item.role_required.is_some_and(|required| !role.at_least(required)) {
        tracing::trace!(item = %item.id, "dropped: role");
        return false;
    }
    if item.license_required && !status.is_valid && !admin {
        tracing::trace!(item = %item.id, "dropped: license");
        return false;
    }
    if !item.permissions.is_empty()
        && !item
            .permissions
            .iter()
            .filter_map(|entry| parse_permission(entry))
            .any(|(action, resource)| may(action, resource))
    {
        tracing::trace!(item = %item.id, "dropped: permissions");
        return false;
    }
    if let Some(feature) = &item.feature_id {
        if !admin && !status.has_feature(feature) {
            tracing::trace!(item = %item.id, feature = %feature, "dropped: feature");
            return false;
        }
    }
    true
}
