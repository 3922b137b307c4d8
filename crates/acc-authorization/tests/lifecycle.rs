//! Session lifecycle, storage faults and privileged writes

mod common;

use acc_authorization::{AccessControl, ProgramSource, ResourceConfig, ResourceRegistry};
use acc_core::keys::license_key;
use acc_core::{
    AccError, AccessConfig, Action, CapabilityOverrides, CapabilitySet, ClockEffects, IdentityKind,
    LicensePatch, LicenseStatus, Role,
};
use acc_store::{
    LicensedProgram, MemoryStorageHandler, ProgramCatalog, StorageEffects, SubscriptionState,
};
use acc_testkit::{
    console_menu, principal, seed_license, seed_user, stored_license, LicenseBuilder,
    ManualClock,
};
use assert_matches::assert_matches;
use chrono::Duration;
use common::{FlakyHarness, Harness};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

fn recorder(h: &Harness) -> (Arc<Mutex<Vec<LicenseStatus>>>, acc_authorization::ObserverHandle) {
    let seen: Arc<Mutex<Vec<LicenseStatus>>> = Arc::default();
    let sink = seen.clone();
    let handle = h
        .access
        .subscribe(move |status: &LicenseStatus| sink.lock().push(status.clone()));
    (seen, handle)
}

#[tokio::test]
async fn test_read_failure_is_pessimistic_and_recovers() {
    let h = FlakyHarness::new();
    h.storage.fail_reads(true);

    let status = h.access.initialize(principal("p", Role::Manager)).await;
    assert_eq!(status, LicenseStatus::pessimistic());
    assert_eq!(h.access.subscription_state(), SubscriptionState::Idle);
    assert!(h.access.has_permission("view", "*").await);
    assert!(!h.access.has_permission("delete", "*").await);
    assert!(!h.access.has_permission("view", "Dashboard").await);

    // Degraded results are never cached: every query goes back to storage.
    let reads = h.storage.read_count();
    h.access.has_permission("view", "*").await;
    assert!(h.storage.read_count() > reads);

    h.storage.fail_reads(false);
    assert!(h.access.has_permission("delete", "Dashboard").await);
    assert_eq!(h.access.subscription_state(), SubscriptionState::Listening);
    assert!(h.access.current_status().unwrap().is_valid);
}

#[tokio::test]
async fn test_slow_storage_times_out() {
    let h = FlakyHarness::with_config(AccessConfig {
        storage_timeout_ms: 20,
        ..AccessConfig::default()
    });
    h.storage.set_delay(Some(std::time::Duration::from_millis(250)));

    let status = h.access.initialize(principal("p", Role::Manager)).await;
    assert_eq!(status, LicenseStatus::pessimistic());
    assert!(!h.access.has_permission("delete", "*").await);

    h.storage.set_delay(None);
    assert!(h.access.has_permission("delete", "*").await);
}

#[tokio::test]
async fn test_write_failure_surfaces_storage_unavailable() {
    let h = FlakyHarness::new();
    h.access.initialize(principal("root", Role::SuperAdmin)).await;

    h.storage.fail_writes(true);
    let result = h
        .access
        .update_license_status("other", LicensePatch::validity(true))
        .await;
    assert_matches!(result, Err(AccError::StorageUnavailable { .. }));
}

#[tokio::test]
async fn test_update_license_status_requires_super_admin() {
    let h = Harness::new();
    let result = h
        .access
        .update_license_status("someone", LicensePatch::validity(true))
        .await;
    assert_matches!(result, Err(AccError::PrincipalUnknown));

    h.access.initialize(principal("boss", Role::Admin)).await;
    let result = h
        .access
        .update_license_status("someone", LicensePatch::validity(true))
        .await;
    assert_matches!(result, Err(AccError::PermissionDenied { .. }));
    assert!(stored_license(&h.storage, "someone").await.is_none());
}

#[tokio::test]
async fn test_super_admin_write_is_stamped() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now()).valid(false).build();
    seed_license(&h.storage, "team-member", &record).await;
    h.access.initialize(principal("root", Role::SuperAdmin)).await;

    h.clock.advance(Duration::minutes(1));
    let written = h
        .access
        .update_license_status("team-member", LicensePatch::validity(true))
        .await
        .unwrap();

    assert!(written.is_valid);
    assert_eq!(written.updated_by.as_deref(), Some("root"));
    assert_eq!(written.updated_at, Some(h.now()));
    assert_eq!(written.created_at, record.created_at);
    assert_eq!(stored_license(&h.storage, "team-member").await, Some(written));
}

#[tokio::test]
async fn test_own_update_reaches_observers() {
    let h = Harness::new();
    h.access.initialize(principal("root", Role::SuperAdmin)).await;
    let (seen, _handle) = recorder(&h);

    h.access
        .update_license_status("root", LicensePatch::validity(false))
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].is_valid);
}

#[tokio::test]
async fn test_principal_switch_ignores_previous_record() {
    let h = Harness::new();
    seed_license(&h.storage, "a", &LicenseBuilder::new(h.now()).build()).await;
    seed_license(&h.storage, "b", &LicenseBuilder::new(h.now()).build()).await;

    h.access.initialize(principal("a", Role::User)).await;
    h.access.initialize(principal("b", Role::User)).await;
    let (seen, _handle) = recorder(&h);

    h.external_writer()
        .write("a", LicensePatch::validity(false), "ops")
        .await
        .unwrap();

    assert!(seen.lock().is_empty());
    assert!(h.access.current_status().unwrap().is_valid);
    assert_eq!(h.access.principal().unwrap().id, "b");
    assert_eq!(h.storage.watcher_count(&license_key("a")), 0);
    assert_eq!(h.storage.watcher_count(&license_key("b")), 1);
}

#[tokio::test]
async fn test_session_expiry_closes_everything() {
    let h = Harness::new();
    let magento = principal("m", Role::Manager).with_identity_kind(IdentityKind::Magento);
    h.access.initialize(magento).await;
    assert!(h.access.has_permission("view", "*").await);

    let err = h.access.on_session_expired(IdentityKind::Magento);
    assert_matches!(
        err,
        AccError::SessionExpired {
            identity_kind: IdentityKind::Magento
        }
    );
    assert!(h.access.principal().is_none());
    assert!(!h.access.has_permission("view", "*").await);
    assert!(h.access.project_menu(&console_menu()).is_empty());
    assert_eq!(h.access.subscription_state(), SubscriptionState::Idle);
}

#[tokio::test]
async fn test_session_expiry_for_other_identity_keeps_principal() {
    let h = Harness::new();
    h.access.initialize(principal("o", Role::User)).await;

    let err = h.access.on_session_expired(IdentityKind::Magento);
    assert_matches!(err, AccError::SessionExpired { .. });
    assert_eq!(h.access.principal().unwrap().id, "o");
}

#[tokio::test]
async fn test_stale_status_is_re_evaluated() {
    let h = Harness::new();
    seed_user(&h.storage, "p", Role::User, h.now()).await;
    h.access.initialize(principal("p", Role::User)).await;
    assert!(!h.access.has_permission("delete", "Dashboard").await);

    seed_user(&h.storage, "p", Role::Manager, h.now()).await;
    assert!(!h.access.has_permission("delete", "Dashboard").await);

    h.clock.advance(Duration::minutes(6));
    assert!(h.access.has_permission("delete", "Dashboard").await);
    assert_eq!(h.access.summarize().role, Role::Manager);
}

#[tokio::test]
async fn test_deleted_record_goes_pessimistic() {
    let h = Harness::new();
    seed_license(&h.storage, "p", &LicenseBuilder::new(h.now()).build()).await;
    h.access.initialize(principal("p", Role::Manager)).await;
    let (seen, _handle) = recorder(&h);

    h.storage.remove(&license_key("p")).await.unwrap();

    let seen = seen.lock();
    assert_eq!(seen.as_slice(), &[LicenseStatus::pessimistic()]);
    assert!(!h.access.check(Action::Delete, "*"));
}

#[tokio::test]
async fn test_malformed_record_evaluates_as_invalid() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now()).malformed().build();
    seed_license(&h.storage, "p", &record).await;

    let status = h.access.initialize(principal("p", Role::User)).await;
    assert!(!status.is_valid);
    assert!(!h.access.has_permission("view", "Dashboard").await);
}

#[tokio::test]
async fn test_undecodable_record_keeps_admin_bypass() {
    let h = Harness::new();
    let (seen, _handle) = recorder(&h);
    h.storage
        .store(&license_key("a"), b"{]".to_vec())
        .await
        .unwrap();

    let status = h.access.initialize(principal("a", Role::Admin)).await;
    assert_eq!(status.role, Role::Admin);
    assert!(!status.is_valid);
    assert_eq!(h.access.current_status().unwrap().role, Role::Admin);
    assert!(h.access.check(Action::View, "ProductsGrid"));
    assert!(h.access.has_permission("delete", "ProductsGrid").await);

    // Rewriting garbage with other garbage changes nothing.
    h.storage
        .store(&license_key("a"), b"not json".to_vec())
        .await
        .unwrap();
    assert!(seen.lock().is_empty());
    assert!(h.access.check(Action::Delete, "OrdersGrid"));

    seed_license(&h.storage, "a", &LicenseBuilder::new(h.now()).build()).await;
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_valid);
    assert_eq!(seen[0].role, Role::Admin);
}

#[tokio::test]
async fn test_update_during_stale_read_wins() {
    let h = FlakyHarness::new();
    seed_license(h.storage.inner(), "u2", &LicenseBuilder::new(h.now()).build()).await;
    h.access.initialize(principal("u2", Role::User)).await;
    assert!(h.access.check(Action::View, "Dashboard"));

    h.clock.advance(Duration::minutes(6));
    let gate = h.storage.hold_next_read(license_key("u2"));

    let (allowed, ()) = tokio::join!(h.access.has_permission("view", "Dashboard"), async {
        gate.wait_entered().await;
        h.external_writer()
            .write("u2", LicensePatch::validity(false), "ops")
            .await
            .unwrap();
        assert!(!h.access.check(Action::View, "Dashboard"));
        gate.release();
    });

    assert!(!allowed);
    assert!(!h.access.current_status().unwrap().is_valid);
    assert!(!h.access.has_permission("view", "Dashboard").await);
    h.access.clear_cache();
    assert!(!h.access.has_permission("view", "Dashboard").await);
}

#[tokio::test]
async fn test_feature_tied_resource_needs_the_feature() {
    acc_testkit::init_test_tracing();
    let storage = MemoryStorageHandler::new();
    let clock = ManualClock::new();
    let mut registry = ResourceRegistry::bootstrap();
    registry.register(
        "VotingBoard",
        ResourceConfig::new(false, Role::User, CapabilitySet::deletable()).with_feature("task_voting"),
    );
    let access = AccessControl::with_registry(
        Arc::new(storage.clone()),
        Arc::new(clock.clone()),
        AccessConfig::default(),
        registry,
    );
    let now = clock.now();
    seed_license(&storage, "plain", &LicenseBuilder::new(now).features(&["core_dashboard"]).build())
        .await;
    seed_license(&storage, "voter", &LicenseBuilder::new(now).features(&["task_voting"]).build())
        .await;

    access.initialize(principal("plain", Role::Manager)).await;
    let locked = access.capabilities("VotingBoard", &CapabilityOverrides::default());
    assert!(!locked.can_read);
    assert!(!locked.can_edit);
    assert!(!locked.can_delete);

    access.initialize(principal("voter", Role::Manager)).await;
    let unlocked = access.capabilities("VotingBoard", &CapabilityOverrides::default());
    assert!(unlocked.can_read);
    assert!(unlocked.can_delete);

    access.initialize(principal("plain", Role::Admin)).await;
    assert!(
        access
            .capabilities("VotingBoard", &CapabilityOverrides::default())
            .can_read
    );
}

#[tokio::test]
async fn test_capabilities_apply_overrides_then_license_mask() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now())
        .program("ProductsGrid", true, &[("view", true), ("edit", false)])
        .build();
    seed_license(&h.storage, "p", &record).await;
    h.access.initialize(principal("p", Role::Admin)).await;

    let plain = h
        .access
        .capabilities("ProductsGrid", &CapabilityOverrides::default());
    assert!(plain.can_read);
    assert!(!plain.can_edit);
    assert!(plain.can_create);

    let overrides = CapabilityOverrides {
        can_delete: Some(true),
        can_edit: Some(true),
        ..CapabilityOverrides::default()
    };
    let overridden = h.access.capabilities("ProductsGrid", &overrides);
    assert!(overridden.can_delete);
    assert!(!overridden.can_edit);

    let unknown = h
        .access
        .capabilities("Unregistered", &CapabilityOverrides::default());
    assert!(!unknown.can_read);
}

#[tokio::test]
async fn test_program_access_prefers_license_over_catalog() {
    let h = Harness::new();
    let mut catalog = BTreeMap::new();
    catalog.insert(
        "ProductsGrid".to_string(),
        LicensedProgram {
            default_enabled: true,
            display_name: "Products".to_string(),
            permissions: BTreeMap::from([("view".to_string(), true)]),
        },
    );
    catalog.insert(
        "OrdersGrid".to_string(),
        LicensedProgram {
            default_enabled: false,
            display_name: "Orders".to_string(),
            permissions: BTreeMap::from([("view".to_string(), true)]),
        },
    );
    ProgramCatalog::new(Arc::new(h.storage.clone()))
        .put(&catalog)
        .await
        .unwrap();

    assert!(h.access.program_access("ProductsGrid").await.is_none());

    let record = LicenseBuilder::new(h.now())
        .program("ProductsGrid", false, &[("view", true)])
        .build();
    seed_license(&h.storage, "p", &record).await;
    h.access.initialize(principal("p", Role::User)).await;

    let products = h.access.program_access("ProductsGrid").await.unwrap();
    assert_eq!(products.source, ProgramSource::License);
    assert!(!products.allows(Action::View));

    let orders = h.access.program_access("OrdersGrid").await.unwrap();
    assert_eq!(orders.source, ProgramSource::Catalog);
    assert!(!orders.allows(Action::View));

    assert!(h.access.program_access("Nothing").await.is_none());
}

#[tokio::test]
async fn test_program_grants_do_not_widen_role_rights() {
    let h = Harness::new();
    assert!(h.access.registry().get("InvoicesGrid").is_some());

    let record = LicenseBuilder::new(h.now())
        .program("InvoicesGrid", true, &[("delete", true)])
        .build();
    seed_license(&h.storage, "p", &record).await;
    h.access.initialize(principal("p", Role::User)).await;

    assert_eq!(
        h.access.allowed_actions("InvoicesGrid"),
        vec![Action::View, Action::Edit, Action::Create]
    );
}

#[tokio::test]
async fn test_feature_access() {
    let h = Harness::new();
    let record = LicenseBuilder::new(h.now())
        .features(&["core_dashboard"])
        .build();
    seed_license(&h.storage, "p", &record).await;
    seed_license(&h.storage, "x", &LicenseBuilder::new(h.now()).valid(false).build()).await;

    assert!(!h.access.validate_feature_access("core_dashboard").await);

    h.access.initialize(principal("p", Role::User)).await;
    assert!(h.access.validate_feature_access("core_dashboard").await);
    assert!(!h.access.validate_feature_access("task_voting").await);

    h.access.initialize(principal("x", Role::Admin)).await;
    assert!(h.access.validate_feature_access("task_voting").await);
}

#[tokio::test]
async fn test_refresh_and_clear_cache() {
    let h = Harness::new();
    seed_license(&h.storage, "p", &LicenseBuilder::new(h.now()).build()).await;
    h.access.initialize(principal("p", Role::User)).await;
    let (seen, _handle) = recorder(&h);

    assert!(h.access.has_permission("view", "Dashboard").await);
    h.access.clear_cache();
    assert!(h.access.has_permission("view", "Dashboard").await);

    let status = h.access.refresh().await;
    assert!(status.is_valid);
    assert!(seen.lock().is_empty());

    seed_user(&h.storage, "p", Role::Viewer, h.now()).await;
    let status = h.access.refresh().await;
    assert_eq!(status.role, Role::Viewer);
    assert_eq!(seen.lock().len(), 1);
    assert!(!h.access.has_permission("edit", "Dashboard").await);
}

#[tokio::test]
async fn test_dropped_observer_stops_receiving() {
    let h = Harness::new();
    h.access.initialize(principal("root", Role::SuperAdmin)).await;
    let (seen, handle) = recorder(&h);
    drop(handle);

    h.external_writer()
        .write("root", LicensePatch::validity(false), "ops")
        .await
        .unwrap();
    assert!(seen.lock().is_empty());
}
