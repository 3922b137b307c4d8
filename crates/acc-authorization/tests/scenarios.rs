//! End-to-end access scenarios
//!
//! Each test starts from empty caches and drives the public API only.

mod common;

use acc_core::{LicenseLevel, LicensePatch, LicenseStatus, LicenseType, Role};
use acc_testkit::{
    console_menu, menu_ids, principal, seed_license, stored_license, LicenseBuilder,
};
use chrono::{TimeZone, Utc};
use common::Harness;
use parking_lot::Mutex;
use std::sync::Arc;

#[tokio::test]
async fn test_first_user_gets_default_license() {
    let h = Harness::new();

    let status = h.access.initialize(principal("u1", Role::SuperAdmin)).await;

    let record = stored_license(&h.storage, "u1").await.unwrap();
    assert_eq!(record.license_type, Some(LicenseType::Free));
    assert!(record.is_valid);
    assert_eq!(record.max_users, 3);
    assert_eq!(
        record.features,
        vec!["bug_bounty", "task_voting", "core_dashboard"]
    );
    assert!(status.is_valid);
    assert_eq!(status.level, LicenseLevel::Admin);

    assert!(h.access.has_permission("delete", "MDMSources").await);
    let menu = menu_ids(&h.access.project_menu(&console_menu()));
    assert!(menu.contains(&"license-management".to_string()));
}

#[tokio::test]
async fn test_standard_user_with_free_license() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now())
        .features(&["core_dashboard"])
        .build();
    seed_license(&h.storage, "u2", &record).await;

    h.access.initialize(principal("u2", Role::User)).await;

    let summary = h.access.summarize();
    assert!(summary.permissions.can_read);
    assert!(summary.permissions.can_edit);
    assert!(!summary.permissions.can_delete);
    assert_eq!(summary.role, Role::User);
    assert_eq!(summary.license_level, LicenseLevel::Basic);

    assert!(h.access.has_permission("view", "Dashboard").await);
    assert!(!h.access.has_permission("edit", "MDMProductsGrid").await);

    let menu = menu_ids(&h.access.project_menu(&console_menu()));
    assert!(!menu.contains(&"license-management".to_string()));
    assert!(menu.contains(&"dashboard".to_string()));
    assert!(!menu.contains(&"voting".to_string()));
}

#[tokio::test]
async fn test_expired_professional_license() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now())
        .tier(LicenseType::Professional)
        .expires(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap())
        .build();
    seed_license(&h.storage, "u3", &record).await;

    let status = h.access.initialize(principal("u3", Role::User)).await;

    assert!(!status.is_valid);
    assert_eq!(status.level, LicenseLevel::Professional);
    assert!(!h.access.has_permission("view", "ProductsGrid").await);
    assert!(!h.access.has_permission("view", "Dashboard").await);
}

#[tokio::test]
async fn test_admin_with_invalid_license() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now()).valid(false).build();
    seed_license(&h.storage, "u4", &record).await;

    h.access.initialize(principal("u4", Role::Admin)).await;

    assert!(!h.access.has_permission("view", "LicenseManagement").await);
    assert!(h.access.has_permission("view", "ProductsGrid").await);
}

#[tokio::test]
async fn test_restricted_fields() {
    let h = Harness::new();
    h.access.initialize(principal("u5", Role::Admin)).await;

    assert!(h.access.is_field_restricted("OrdersGrid", "payment_info"));
    assert!(!h.access.is_field_restricted("OrdersGrid", "status"));
    assert_eq!(h.access.max_rows("MDMProductsGrid"), 100);
    assert_eq!(h.access.max_rows("OrdersGrid"), 25);
}

#[tokio::test]
async fn test_live_invalidation_notifies_once() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now())
        .features(&["core_dashboard"])
        .build();
    seed_license(&h.storage, "u2", &record).await;
    h.access.initialize(principal("u2", Role::User)).await;

    let seen: Arc<Mutex<Vec<LicenseStatus>>> = Arc::default();
    let sink = seen.clone();
    let _observer = h.access.subscribe(move |status: &LicenseStatus| {
        sink.lock().push(status.clone());
    });
    assert!(h.access.has_permission("view", "Dashboard").await);

    h.external_writer()
        .write("u2", LicensePatch::validity(false), "ops")
        .await
        .unwrap();

    assert!(!h.access.has_permission("view", "ProductsGrid").await);
    assert!(!h.access.has_permission("view", "Dashboard").await);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].is_valid);
    assert_eq!(seen[0].role, Role::User);
}
