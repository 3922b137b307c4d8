//! Permission engine
//!
//! Grant derivation from a license record, the `may` decision function and
//! the per-principal decision cache.
//!
//! Decision order for `(action, resource)`:
//!
//! 1. no status → deny
//! 2. cached decision younger than the decision TTL → return it
//! 3. registered resource with a higher `minimum_role` → deny
//! 4. `admin` / `super_admin` → allow
//! 5. role's coarse capability for the action must hold
//! 6. for a named resource, a grant or an enabled program entry must cover it
//! 7. license-gated resource → the license must be valid
//!
//! Decisions taken against a degraded (fallback) status are never cached.

use acc_core::keys::decision_cache_key;
use acc_core::{
    Action, ClockEffects, LicenseLevel, LicenseRecord, LicenseStatus, PermissionGrant,
    ResourceScope, Role,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::ResourceRegistry;

/// Role-derived grants followed by one licensed grant per enabled program
/// action.
pub fn derive_grants(record: &LicenseRecord, role: Role) -> Vec<PermissionGrant> {
    let tiers: [(Role, &[Action]); 4] = [
        (Role::Viewer, &[Action::View]),
        (Role::User, &[Action::View, Action::Edit]),
        (Role::Manager, &[Action::View, Action::Edit, Action::Delete]),
        (
            Role::Admin,
            &[Action::View, Action::Edit, Action::Delete, Action::Create],
        ),
    ];
    let mut grants: Vec<PermissionGrant> = tiers
        .into_iter()
        .filter(|(required, _)| role.at_least(*required))
        .map(|(_, actions)| PermissionGrant::new(ResourceScope::Any, actions.to_vec()))
        .collect();

    for (resource, program) in &record.program_permissions {
        if !program.enabled {
            continue;
        }
        for action in program.granted_actions() {
            grants.push(PermissionGrant::licensed(resource.as_str(), action));
        }
    }
    grants
}

/// Status a decision is taken against.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    /// Last resolved license status
    pub status: &'a LicenseStatus,
    /// Status is a fault fallback rather than a derivation
    pub degraded: bool,
}

impl<'a> Subject<'a> {
    /// Subject for a status derived from a real record.
    pub fn resolved(status: &'a LicenseStatus) -> Self {
        Self {
            status,
            degraded: false,
        }
    }
}

/// Coarse rights over every resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPermissions {
    /// `view`
    pub can_read: bool,
    /// `edit`
    pub can_edit: bool,
    /// `delete`
    pub can_delete: bool,
    /// `create`
    pub can_create: bool,
    /// `manage_users`
    pub can_manage_users: bool,
    /// `assign_roles`
    pub can_assign_roles: bool,
}

/// Snapshot of a principal's effective access, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSummary {
    /// Effective role
    pub role: Role,
    /// Effective license level
    pub license_level: LicenseLevel,
    /// License validity
    pub is_valid: bool,
    /// Coarse rights
    pub permissions: SummaryPermissions,
    /// Licensed features
    pub features: Vec<String>,
    /// License expiry
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct CachedDecision {
    allowed: bool,
    decided_at: DateTime<Utc>,
}

/// Decision function plus its cache. One engine per principal session.
pub struct PermissionEngine {
    registry: Arc<ResourceRegistry>,
    clock: Arc<dyn ClockEffects>,
    ttl: Duration,
    decisions: Mutex<HashMap<String, CachedDecision>>,
}

impl PermissionEngine {
    /// Engine over a registry with the given decision TTL.
    pub fn new(registry: Arc<ResourceRegistry>, clock: Arc<dyn ClockEffects>, ttl: Duration) -> Self {
        Self {
            registry,
            clock,
            ttl,
            decisions: Mutex::new(HashMap::new()),
        }
    }

    /// Registry decisions consult.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Cached decision for `(action, resource)`.
    pub fn may(&self, subject: Option<Subject<'_>>, action: Action, resource: &str) -> bool {
        let Some(subject) = subject else {
            tracing::debug!(%action, resource, "no license status, denying");
            return false;
        };

        let key = decision_cache_key(action, resource);
        let now = self.clock.now();
        if let Some(cached) = self.decisions.lock().get(&key) {
            if now - cached.decided_at < self.ttl {
                tracing::trace!(%action, resource, allowed = cached.allowed, cache = "hit");
                return cached.allowed;
            }
        }

        let allowed = self.decide(subject.status, action, resource);
        if !subject.degraded {
            self.decisions.lock().insert(
                key,
                CachedDecision {
                    allowed,
                    decided_at: now,
                },
            );
        }
        tracing::debug!(
            %action,
            resource,
            role = %subject.status.role,
            allowed,
            degraded = subject.degraded,
            "permission decided"
        );
        allowed
    }

    /// Uncached decision.
    pub fn decide(&self, status: &LicenseStatus, action: Action, resource: &str) -> bool {
        let role = status.role;
        let config = self.registry.get(resource);

        if let Some(config) = config {
            if !role.at_least(config.minimum_role) {
                return false;
            }
        }
        if role.is_admin() {
            return true;
        }
        if !role.capabilities().allows(action) {
            return false;
        }
        if resource != "*"
            && !status.grants(resource, action)
            && !status.program_allows(resource, action)
        {
            return false;
        }
        if config.is_some_and(|config| config.license_gated()) && !status.is_valid {
            return false;
        }
        true
    }

    /// Every action `may` allows on `resource`, in enumeration order.
    pub fn allowed_actions(&self, subject: Option<Subject<'_>>, resource: &str) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.may(subject, *action, resource))
            .collect()
    }

    /// Summary over the `*` resource. Without a status every right is false.
    pub fn summarize(&self, subject: Option<Subject<'_>>) -> PermissionSummary {
        let fallback = LicenseStatus::pessimistic();
        let status = subject.map_or(&fallback, |subject| subject.status);
        let may = |action| self.may(subject, action, "*");
        PermissionSummary {
            role: status.role,
            license_level: status.level,
            is_valid: status.is_valid,
            permissions: SummaryPermissions {
                can_read: may(Action::View),
                can_edit: may(Action::Edit),
                can_delete: may(Action::Delete),
                can_create: may(Action::Create),
                can_manage_users: may(Action::ManageUsers),
                can_assign_roles: may(Action::AssignRoles),
            },
            features: status.features.clone(),
            expiry_date: status.expiry_date,
        }
    }

    /// Drop every cached decision.
    pub fn clear(&self) {
        self.decisions.lock().clear();
    }

    /// Number of cached decisions.
    pub fn cached_decisions(&self) -> usize {
        self.decisions.lock().len()
    }
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine")
            .field("ttl", &self.ttl)
            .field("cached_decisions", &self.cached_decisions())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acc_core::{LicenseType, ProgramPermission, SystemClock};
    use std::collections::BTreeMap;

    fn record(programs: BTreeMap<String, ProgramPermission>) -> LicenseRecord {
        let mut record = LicenseRecord::default_free(Utc::now(), vec![], 3);
        record.program_permissions = programs;
        record
    }

    fn status(role: Role, is_valid: bool, programs: BTreeMap<String, ProgramPermission>) -> LicenseStatus {
        let record = record(programs);
        LicenseStatus {
            is_valid,
            level: LicenseLevel::resolve(&LicenseType::Free, role),
            expiry_date: None,
            features: vec![],
            permissions: derive_grants(&record, role),
            license_type: LicenseType::Free,
            max_users: 3,
            role,
            programs: record.program_permissions,
        }
    }

    fn engine() -> PermissionEngine {
        PermissionEngine::new(
            Arc::new(ResourceRegistry::bootstrap()),
            Arc::new(SystemClock::new()),
            Duration::minutes(2),
        )
    }

    #[test]
    fn grants_accumulate_by_rank() {
        let grants = derive_grants(&record(BTreeMap::new()), Role::Manager);
        assert_eq!(grants.len(), 3);
        assert_eq!(grants[2].actions, vec![Action::View, Action::Edit, Action::Delete]);

        let admin = derive_grants(&record(BTreeMap::new()), Role::Admin);
        assert!(admin[3].actions.contains(&Action::Create));
    }

    #[test]
    fn disabled_programs_grant_nothing() {
        let programs = BTreeMap::from([
            (
                "Reports".to_string(),
                ProgramPermission {
                    enabled: true,
                    permissions: BTreeMap::from([("read".to_string(), true)]),
                },
            ),
            (
                "Exports".to_string(),
                ProgramPermission {
                    enabled: false,
                    permissions: BTreeMap::from([("view".to_string(), true)]),
                },
            ),
        ]);
        let grants = derive_grants(&record(programs), Role::Viewer);
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[1], PermissionGrant::licensed("Reports", Action::View));
    }

    #[test]
    fn viewer_cannot_edit_anything() {
        let engine = engine();
        let status = status(Role::Viewer, true, BTreeMap::new());
        let subject = Some(Subject::resolved(&status));
        assert!(engine.may(subject, Action::View, "*"));
        assert!(!engine.may(subject, Action::Edit, "*"));
        assert!(!engine.may(subject, Action::Create, "Dashboard"));
    }

    #[test]
    fn user_create_follows_edit() {
        let engine = engine();
        let status = status(Role::User, true, BTreeMap::new());
        let subject = Some(Subject::resolved(&status));
        assert!(engine.may(subject, Action::Create, "Dashboard"));
        assert!(!engine.may(subject, Action::Delete, "Dashboard"));
        assert_eq!(
            engine.allowed_actions(subject, "OrdersGrid"),
            vec![Action::View, Action::Edit, Action::Create]
        );
    }

    #[test]
    fn minimum_role_beats_admin_bypass() {
        let engine = engine();
        let status = status(Role::Admin, false, BTreeMap::new());
        let subject = Some(Subject::resolved(&status));
        assert!(!engine.may(subject, Action::View, "LicenseManagement"));
        assert!(engine.may(subject, Action::Delete, "ProductsGrid"));
        assert!(engine.may(subject, Action::AssignRoles, "Anything"));
    }

    #[test]
    fn invalid_license_closes_gated_resources() {
        let engine = engine();
        let status = status(Role::User, false, BTreeMap::new());
        let subject = Some(Subject::resolved(&status));
        assert!(!engine.may(subject, Action::View, "Dashboard"));
        assert!(engine.may(subject, Action::View, "LicenseStatus"));
        assert!(engine.may(subject, Action::View, "Unregistered"));
    }

    #[test]
    fn degraded_decisions_are_not_cached() {
        let engine = engine();
        let status = LicenseStatus::pessimistic();
        let subject = Some(Subject {
            status: &status,
            degraded: true,
        });
        assert!(!engine.may(subject, Action::View, "Dashboard"));
        assert_eq!(engine.cached_decisions(), 0);

        let healthy = self::status(Role::User, true, BTreeMap::new());
        assert!(engine.may(Some(Subject::resolved(&healthy)), Action::View, "Dashboard"));
        assert_eq!(engine.cached_decisions(), 1);
    }

    #[test]
    fn summary_without_status_is_closed() {
        let summary = engine().summarize(None);
        assert_eq!(summary.permissions, SummaryPermissions::default());
        assert!(!summary.is_valid);
    }
}
