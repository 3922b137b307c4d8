//! Resource registry
//!
//! Static, code-defined table from component identifier to per-resource
//! defaults. The registry is the only place those defaults come from; a
//! resource that is not registered has no required license, no minimum role,
//! no restricted fields and the configured default row cap.

use acc_core::{
    AccessLevel, CapabilityOverrides, CapabilitySet, LicenseCapabilityMask, Role,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row cap for resources without an explicit `max_rows`.
pub const DEFAULT_MAX_ROWS: usize = 25;

/// Per-resource access defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Access requires a valid license
    pub required_license: bool,
    /// Lowest role that may touch the resource at all
    pub minimum_role: Role,
    /// Base capabilities before overrides and license masks
    pub base: CapabilitySet,
    /// Fields hidden from non-privileged views
    #[serde(default)]
    pub restricted_fields: Vec<String>,
    /// Page size cap
    #[serde(default)]
    pub max_rows: Option<usize>,
    /// License feature that unlocks the resource
    #[serde(default)]
    pub licensed_feature_id: Option<String>,
    /// Licensed, but on for every license unless switched off
    #[serde(default)]
    pub default_enabled: bool,
}

impl ResourceConfig {
    /// Entry with the given gate and base capabilities.
    pub fn new(required_license: bool, minimum_role: Role, base: CapabilitySet) -> Self {
        Self {
            required_license,
            minimum_role,
            base,
            restricted_fields: Vec::new(),
            max_rows: None,
            licensed_feature_id: None,
            default_enabled: false,
        }
    }

    /// Set the page size cap.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Set the restricted field list.
    pub fn with_restricted_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restricted_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Tie the resource to a license feature.
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.licensed_feature_id = Some(feature.into());
        self
    }

    /// Mark the resource as licensed but enabled by default.
    pub fn default_enabled(mut self) -> Self {
        self.default_enabled = true;
        self
    }

    /// Whether a principal must hold a valid license to use this resource.
    pub fn license_gated(&self) -> bool {
        self.required_license && !self.default_enabled
    }
}

static BOOTSTRAP: Lazy<BTreeMap<String, ResourceConfig>> = Lazy::new(|| {
    let read = CapabilitySet::read_only();
    let write = CapabilitySet::writable();
    let entries = [
        ("Dashboard", ResourceConfig::new(true, Role::User, read)),
        (
            "MDMProductsGrid",
            ResourceConfig::new(true, Role::Admin, write).with_max_rows(100),
        ),
        (
            "MDMSources",
            ResourceConfig::new(true, Role::Admin, CapabilitySet::deletable()),
        ),
        (
            "ProductsGrid",
            ResourceConfig::new(true, Role::Admin, write).with_max_rows(50),
        ),
        (
            "OrdersGrid",
            ResourceConfig::new(true, Role::User, read)
                .with_restricted_fields(["payment_info", "customer_notes"]),
        ),
        (
            "CustomersGrid",
            ResourceConfig::new(true, Role::Admin, write)
                .with_restricted_fields(["password_hash", "payment_methods"]),
        ),
        ("InvoicesGrid", ResourceConfig::new(true, Role::User, read)),
        (
            "LicenseManagement",
            ResourceConfig::new(
                false,
                Role::SuperAdmin,
                CapabilitySet::full(AccessLevel::SuperAdmin),
            ),
        ),
        ("LicenseStatus", ResourceConfig::new(false, Role::User, read)),
    ];
    entries
        .into_iter()
        .map(|(id, config)| (id.to_string(), config))
        .collect()
});

/// Component identifier → [`ResourceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRegistry {
    entries: BTreeMap<String, ResourceConfig>,
    default_max_rows: usize,
}

impl ResourceRegistry {
    /// Empty registry.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            default_max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Registry seeded with the built-in resource table.
    pub fn bootstrap() -> Self {
        Self {
            entries: BOOTSTRAP.clone(),
            default_max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Override the row cap used for resources without one.
    pub fn with_default_max_rows(mut self, max_rows: usize) -> Self {
        self.default_max_rows = max_rows;
        self
    }

    /// Add or replace an entry.
    pub fn register(&mut self, id: impl Into<String>, config: ResourceConfig) -> &mut Self {
        self.entries.insert(id.into(), config);
        self
    }

    /// Look up a resource.
    pub fn get(&self, id: &str) -> Option<&ResourceConfig> {
        self.entries.get(id)
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `field ∈ restricted_fields` for a registered resource.
    pub fn is_field_restricted(&self, resource: &str, field: &str) -> bool {
        self.get(resource)
            .is_some_and(|config| config.restricted_fields.iter().any(|f| f == field))
    }

    /// Row cap for a resource.
    pub fn max_rows(&self, resource: &str) -> usize {
        self.get(resource)
            .and_then(|config| config.max_rows)
            .unwrap_or(self.default_max_rows)
    }

    /// `DEFAULT → base → overrides → mask`, later layers winning.
    pub fn effective_capabilities(
        &self,
        resource: &str,
        overrides: &CapabilityOverrides,
        mask: &LicenseCapabilityMask,
    ) -> CapabilitySet {
        let base = self
            .get(resource)
            .map(|config| config.base)
            .unwrap_or(CapabilitySet::DEFAULT);
        base.with_overrides(overrides).with_mask(mask)
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::bootstrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_table() {
        let registry = ResourceRegistry::bootstrap();
        assert_eq!(registry.ids().count(), 9);

        let license_mgmt = registry.get("LicenseManagement").unwrap();
        assert!(!license_mgmt.required_license);
        assert_eq!(license_mgmt.minimum_role, Role::SuperAdmin);
        assert_eq!(license_mgmt.base.level, AccessLevel::SuperAdmin);

        let sources = registry.get("MDMSources").unwrap();
        assert!(sources.license_gated());
        assert_eq!(sources.base.level, AccessLevel::Delete);
    }

    #[test]
    fn row_caps_fall_back_to_default() {
        let registry = ResourceRegistry::bootstrap();
        assert_eq!(registry.max_rows("MDMProductsGrid"), 100);
        assert_eq!(registry.max_rows("ProductsGrid"), 50);
        assert_eq!(registry.max_rows("Dashboard"), 25);
        assert_eq!(registry.max_rows("Unknown"), 25);
        assert_eq!(registry.with_default_max_rows(10).max_rows("Unknown"), 10);
    }

    #[test]
    fn restricted_fields() {
        let registry = ResourceRegistry::bootstrap();
        assert!(registry.is_field_restricted("OrdersGrid", "payment_info"));
        assert!(registry.is_field_restricted("CustomersGrid", "password_hash"));
        assert!(!registry.is_field_restricted("OrdersGrid", "status"));
        assert!(!registry.is_field_restricted("Unknown", "payment_info"));
    }

    #[test]
    fn capability_layers_apply_in_order() {
        let registry = ResourceRegistry::bootstrap();
        let overrides = CapabilityOverrides {
            can_delete: Some(true),
            ..CapabilityOverrides::default()
        };
        let mask = LicenseCapabilityMask {
            can_delete: Some(false),
            ..LicenseCapabilityMask::default()
        };

        let caps = registry.effective_capabilities("OrdersGrid", &overrides, &mask);
        assert!(caps.can_read);
        assert!(!caps.can_delete);
        assert!(!caps.can_edit);

        let unknown = registry.effective_capabilities(
            "Unknown",
            &CapabilityOverrides::default(),
            &LicenseCapabilityMask::default(),
        );
        assert_eq!(unknown, CapabilitySet::DEFAULT);
    }

    #[test]
    fn default_enabled_lifts_the_license_gate() {
        let mut registry = ResourceRegistry::empty();
        registry.register(
            "Reports",
            ResourceConfig::new(true, Role::User, CapabilitySet::read_only()).default_enabled(),
        );
        assert!(!registry.get("Reports").unwrap().license_gated());
    }

    #[test]
    fn feature_ties_are_opt_in() {
        let mut registry = ResourceRegistry::bootstrap();
        assert!(registry
            .ids()
            .all(|id| registry.get(id).unwrap().licensed_feature_id.is_none()));

        registry.register(
            "Voting",
            ResourceConfig::new(false, Role::User, CapabilitySet::read_only())
                .with_feature("task_voting"),
        );
        assert_eq!(
            registry.get("Voting").unwrap().licensed_feature_id.as_deref(),
            Some("task_voting")
        );
    }
}
