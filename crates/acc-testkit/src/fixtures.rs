//! Principals, license records and menu trees used across tests.

use acc_authorization::MenuItem;
use acc_core::keys::{license_key, user_key};
use acc_core::{
    Action, LicenseRecord, LicenseType, Principal, ProgramPermission, Role, UserRecord,
};
use acc_store::{MemoryStorageHandler, StorageEffects};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Principal with an OAuth identity.
pub fn principal(id: &str, role: Role) -> Principal {
    Principal::new(id, role).with_display_name(format!("Test {id}"))
}

/// Builder for license documents.
#[derive(Debug, Clone)]
pub struct LicenseBuilder {
    record: LicenseRecord,
}

impl LicenseBuilder {
    /// Valid, non-expiring free license created at `created_at`.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            record: LicenseRecord::default_free(created_at, Vec::new(), 3),
        }
    }

    /// Set the validity flag.
    pub fn valid(mut self, is_valid: bool) -> Self {
        self.record.is_valid = is_valid;
        self
    }

    /// Set the tier.
    pub fn tier(mut self, license_type: LicenseType) -> Self {
        self.record.license_type = Some(license_type);
        self
    }

    /// Set the feature list.
    pub fn features(mut self, features: &[&str]) -> Self {
        self.record.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Set the expiry.
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.record.expiry_date = Some(at);
        self
    }

    /// Add a program override granting `actions`.
    pub fn program(mut self, resource: &str, enabled: bool, actions: &[(&str, bool)]) -> Self {
        let permissions: BTreeMap<String, bool> = actions
            .iter()
            .map(|(action, granted)| (action.to_string(), *granted))
            .collect();
        self.record.program_permissions.insert(
            resource.to_string(),
            ProgramPermission {
                enabled,
                permissions,
            },
        );
        self
    }

    /// Drop `createdAt`, making the record malformed.
    pub fn malformed(mut self) -> Self {
        self.record.created_at = None;
        self
    }

    /// Finished record.
    pub fn build(self) -> LicenseRecord {
        self.record
    }
}

/// Write `record` verbatim under `licenses/<keyed-id>`.
pub async fn seed_license(storage: &MemoryStorageHandler, id: &str, record: &LicenseRecord) {
    let bytes = serde_json::to_vec(record).unwrap();
    storage.store(&license_key(id), bytes).await.unwrap();
}

/// Write a user record carrying `role` under `users/<keyed-id>`.
pub async fn seed_user(storage: &MemoryStorageHandler, id: &str, role: Role, now: DateTime<Utc>) {
    let mut record = UserRecord::for_principal(&principal(id, role), now);
    record.role = role;
    let bytes = serde_json::to_vec(&record).unwrap();
    storage.store(&user_key(id), bytes).await.unwrap();
}

/// Read the raw license document for `id`.
pub async fn stored_license(storage: &MemoryStorageHandler, id: &str) -> Option<LicenseRecord> {
    let bytes = storage.retrieve(&license_key(id)).await.unwrap()?;
    Some(serde_json::from_slice(&bytes).unwrap())
}

/// Console navigation tree covering every gate kind.
pub fn console_menu() -> Vec<MenuItem> {
    vec![
        MenuItem::new("dashboard", "Dashboard")
            .with_path("/")
            .requires_permission(Action::View, "Dashboard"),
        MenuItem::new("catalog", "Catalog").with_children(vec![
            MenuItem::new("products", "Products")
                .with_path("/products")
                .requires_license()
                .requires_permission(Action::View, "ProductsGrid"),
            MenuItem::new("mdm", "MDM Products")
                .with_path("/mdm/products")
                .requires_role(Role::Admin)
                .requires_license(),
        ]),
        MenuItem::new("sales", "Sales").with_children(vec![
            MenuItem::new("orders", "Orders")
                .with_path("/orders")
                .requires_license()
                .requires_permission(Action::View, "OrdersGrid"),
            MenuItem::new("invoices", "Invoices")
                .with_path("/invoices")
                .requires_permission(Action::View, "InvoicesGrid"),
        ]),
        MenuItem::new("voting", "Task Voting")
            .with_path("/voting")
            .requires_feature("task_voting"),
        MenuItem::new("license-status", "License Status").with_path("/license"),
        MenuItem::new("license-management", "License Management")
            .with_path("/admin/licenses")
            .requires_role(Role::SuperAdmin),
    ]
}

/// Identifiers of `items` and all descendants, depth first.
pub fn menu_ids(items: &[MenuItem]) -> Vec<String> {
    let mut ids = Vec::new();
    for item in items {
        ids.push(item.id.clone());
        ids.extend(menu_ids(&item.children));
    }
    ids
}

/// Every node of `items` that carries `license_required`, depth first.
pub fn licensed_nodes(items: &[MenuItem]) -> Vec<String> {
    let mut ids = Vec::new();
    for item in items {
        if item.license_required {
            ids.push(item.id.clone());
        }
        ids.extend(licensed_nodes(&item.children));
    }
    ids
}
