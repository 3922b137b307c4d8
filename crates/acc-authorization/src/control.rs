//! Access control facade
//!
//! [`AccessControl`] owns one principal session at a time: the license
//! evaluator, the permission engine, the live subscription to the principal's
//! license record and the observers interested in status changes.
//!
//! Session changes bump a generation counter. Evaluations and store deliveries
//! carry the generation they were started under and are discarded when it no
//! longer matches, so nothing from a previous principal leaks into the next.
//! Within a session every accepted store delivery bumps a second counter; an
//! evaluation that was in flight across a delivery is dropped rather than
//! allowed to overwrite the newer record.

use acc_core::{
    AccError, AccessConfig, Action, CapabilityOverrides, CapabilitySet, ClockEffects,
    IdentityKind, LicenseCapabilityMask, LicensePatch, LicenseRecord, LicenseStatus, Principal,
    ProgramPermission, Role,
};
use acc_store::{
    LicenseChange, LicenseListener, LicenseStore, LicenseSubscription, ProgramCatalog,
    StorageEffects, SubscriptionState, UserDirectory,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

use crate::errors::AuthorizationResult;
use crate::evaluator::{Evaluation, LicenseEvaluator};
use crate::menu::{self, MenuItem};
use crate::notify::{ObserverHandle, ObserverSet};
use crate::permissions::{PermissionEngine, PermissionSummary, Subject};
use crate::registry::ResourceRegistry;

/// Where a program's effective settings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramSource {
    /// Override in the principal's license record
    License,
    /// System-wide catalog default
    Catalog,
}

/// Effective settings of one licensed program for the current principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAccess {
    /// Enabled flag and action map
    pub permission: ProgramPermission,
    /// Origin of the settings
    pub source: ProgramSource,
}

impl ProgramAccess {
    /// `enabled ∧ permissions[action]`
    pub fn allows(&self, action: Action) -> bool {
        self.permission.allows(action)
    }
}

/// Point in a session's history an evaluation was started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Epoch {
    generation: u64,
    deliveries: u64,
}

#[derive(Debug, Default)]
struct Session {
    generation: u64,
    deliveries: u64,
    principal: Option<Principal>,
    status: Option<LicenseStatus>,
    record: Option<LicenseRecord>,
    role: Option<Role>,
    degraded: bool,
}

impl Session {
    fn subject(&self) -> Option<Subject<'_>> {
        self.status.as_ref().map(|status| Subject {
            status,
            degraded: self.degraded,
        })
    }

    fn epoch(&self) -> Epoch {
        Epoch {
            generation: self.generation,
            deliveries: self.deliveries,
        }
    }

    fn effective_role(&self) -> Option<Role> {
        self.role
            .or_else(|| self.principal.as_ref().map(|principal| principal.role))
    }
}

struct Shared {
    licenses: LicenseStore,
    programs: ProgramCatalog,
    clock: Arc<dyn ClockEffects>,
    registry: Arc<ResourceRegistry>,
    evaluator: LicenseEvaluator,
    engine: PermissionEngine,
    observers: ObserverSet,
    session: RwLock<Session>,
    subscription: Mutex<Option<LicenseSubscription>>,
}

impl Shared {
    /// Install an evaluation if no principal change or store delivery happened
    /// since it started, and cache it in the evaluator. Clears the decision
    /// cache when the status changed; notifies on request. Returns the status
    /// in force afterwards.
    fn apply(
        &self,
        epoch: Epoch,
        principal: &str,
        evaluation: Evaluation,
        notify: bool,
    ) -> LicenseStatus {
        let (current, changed_status) = {
            let mut session = self.session.write();
            if session.generation != epoch.generation {
                tracing::debug!(
                    generation = epoch.generation,
                    "discarding evaluation for a previous session"
                );
                return evaluation.status;
            }
            if session.deliveries != epoch.deliveries {
                tracing::debug!(principal, "discarding evaluation overtaken by a license update");
                return session
                    .status
                    .clone()
                    .unwrap_or_else(LicenseStatus::pessimistic);
            }
            self.evaluator.accept(principal, &evaluation);
            let changed = session.status.as_ref() != Some(&evaluation.status)
                || session.degraded != evaluation.degraded;
            session.status = Some(evaluation.status.clone());
            session.record = evaluation.record;
            session.role = Some(evaluation.role);
            session.degraded = evaluation.degraded;
            if changed {
                self.engine.clear();
            }
            let notify_with = (changed && notify).then(|| evaluation.status.clone());
            (evaluation.status, notify_with)
        };
        if let Some(status) = changed_status {
            self.observers.notify(&status);
        }
        current
    }

    fn on_record_change(&self, generation: u64, principal: &str, change: LicenseChange) {
        let record = match change {
            LicenseChange::Updated(record) => Some(record),
            LicenseChange::Malformed => Some(LicenseRecord::default()),
            LicenseChange::Removed => None,
        };
        let status = {
            let mut session = self.session.write();
            if session.generation != generation {
                tracing::trace!(principal, "ignoring delivery for a previous session");
                return;
            }
            if session.status.is_some() && session.record == record {
                tracing::trace!(principal, "ignoring unchanged license delivery");
                return;
            }

            self.evaluator.invalidate(principal);
            let role = session.effective_role().unwrap_or_default();
            let (status, degraded) = match &record {
                Some(record) => {
                    let status = LicenseEvaluator::derive(record, role, self.clock.now());
                    self.evaluator.prime(principal, record.clone(), status.clone());
                    (status, false)
                }
                None => (LicenseStatus::pessimistic(), true),
            };
            session.status = Some(status.clone());
            session.record = record;
            session.degraded = degraded;
            session.deliveries += 1;
            self.engine.clear();
            status
        };
        tracing::info!(
            principal,
            is_valid = status.is_valid,
            level = ?status.level,
            "license record changed"
        );
        self.observers.notify(&status);
    }

    /// Start a new session generation, detaching the previous subscription
    /// and emptying both caches.
    fn reset(&self, principal: Option<Principal>) -> u64 {
        let mut session = self.session.write();
        if let Some(mut subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        let generation = session.generation + 1;
        *session = Session {
            generation,
            principal,
            ..Session::default()
        };
        self.evaluator.clear();
        self.engine.clear();
        generation
    }
}

/// Per-session entry point: decisions, menu projection, summaries and live
/// license updates for one principal at a time.
#[derive(Clone)]
pub struct AccessControl {
    shared: Arc<Shared>,
}

impl AccessControl {
    /// Engine over the bootstrap resource registry.
    pub fn new(
        storage: Arc<dyn StorageEffects>,
        clock: Arc<dyn ClockEffects>,
        config: AccessConfig,
    ) -> Self {
        let registry = ResourceRegistry::bootstrap().with_default_max_rows(config.default_max_rows);
        Self::with_registry(storage, clock, config, registry)
    }

    /// Engine over a caller-supplied resource registry.
    pub fn with_registry(
        storage: Arc<dyn StorageEffects>,
        clock: Arc<dyn ClockEffects>,
        config: AccessConfig,
        registry: ResourceRegistry,
    ) -> Self {
        let timeout = config.storage_timeout();
        let licenses = LicenseStore::new(storage.clone(), clock.clone()).with_timeout(timeout);
        let users = UserDirectory::new(storage.clone()).with_timeout(timeout);
        let programs = ProgramCatalog::new(storage).with_timeout(timeout);
        let registry = Arc::new(registry);

        let evaluator = LicenseEvaluator::new(licenses.clone(), users, clock.clone(), &config);
        let engine = PermissionEngine::new(registry.clone(), clock.clone(), config.decision_ttl());

        Self {
            shared: Arc::new(Shared {
                licenses,
                programs,
                clock,
                registry,
                evaluator,
                engine,
                observers: ObserverSet::new(),
                session: RwLock::new(Session::default()),
                subscription: Mutex::new(None),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Make `principal` current: tear down the previous session, resolve the
    /// license status and subscribe to the principal's license record.
    pub async fn initialize(&self, principal: Principal) -> LicenseStatus {
        let previous = self.principal().map(|p| p.id);
        let generation = self.shared.reset(Some(principal.clone()));
        tracing::info!(
            principal = %principal.id,
            role = %principal.role,
            identity_kind = %principal.identity_kind,
            previous = ?previous,
            "initializing access control"
        );

        let epoch = Epoch {
            generation,
            deliveries: 0,
        };
        let evaluation = self.shared.evaluator.load(&principal).await;
        let status = self.shared.apply(epoch, &principal.id, evaluation, false);
        self.attach(generation, &principal.id).await;
        status
    }

    async fn attach(&self, generation: u64, id: &str) {
        let weak = Arc::downgrade(&self.shared);
        let principal = id.to_string();
        let listener: LicenseListener = Arc::new(move |change: LicenseChange| {
            if let Some(shared) = weak.upgrade() {
                shared.on_record_change(generation, &principal, change);
            }
        });

        match self.shared.licenses.subscribe(id, listener).await {
            Ok(subscription) => {
                let session = self.shared.session.read();
                if session.generation == generation {
                    *self.shared.subscription.lock() = Some(subscription);
                }
            }
            Err(err) => {
                tracing::warn!(principal = %id, error = %err, "live license updates unavailable");
            }
        }
    }

    /// Forget the current principal.
    pub fn clear_principal(&self) {
        if let Some(principal) = self.principal() {
            tracing::info!(principal = %principal.id, "clearing principal");
        }
        self.shared.reset(None);
    }

    /// Identity collaborator reported a lost session. Clears the principal if
    /// its identity kind matches and returns the error for the caller.
    pub fn on_session_expired(&self, identity_kind: IdentityKind) -> AccError {
        let matches = self
            .shared
            .session
            .read()
            .principal
            .as_ref()
            .is_some_and(|principal| principal.identity_kind == identity_kind);
        if matches {
            tracing::info!(%identity_kind, "session expired");
            self.clear_principal();
        }
        AccError::session_expired(identity_kind)
    }

    /// Current principal.
    pub fn principal(&self) -> Option<Principal> {
        self.shared.session.read().principal.clone()
    }

    /// Last resolved status.
    pub fn current_status(&self) -> Option<LicenseStatus> {
        self.shared.session.read().status.clone()
    }

    /// State of the live subscription to the current principal's record.
    pub fn subscription_state(&self) -> SubscriptionState {
        self.shared
            .subscription
            .lock()
            .as_ref()
            .map_or(SubscriptionState::Idle, LicenseSubscription::state)
    }

    /// Resource registry in use.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.shared.registry
    }

    // ─────────────────────────────────────────────────────────────────────
    // Decisions
    // ─────────────────────────────────────────────────────────────────────

    fn with_subject<T>(&self, f: impl FnOnce(&PermissionEngine, Option<Subject<'_>>) -> T) -> T {
        let session = self.shared.session.read();
        f(&self.shared.engine, session.subject())
    }

    fn current_epoch(&self) -> Option<(Principal, Epoch)> {
        let session = self.shared.session.read();
        session
            .principal
            .clone()
            .map(|principal| (principal, session.epoch()))
    }

    async fn ensure_fresh(&self) {
        let Some((principal, epoch)) = self.current_epoch() else {
            return;
        };
        if self.shared.evaluator.is_fresh(&principal.id) {
            return;
        }
        let evaluation = self.shared.evaluator.load(&principal).await;
        let recovered = !evaluation.degraded;
        self.shared.apply(epoch, &principal.id, evaluation, true);

        let detached = self.shared.subscription.lock().is_none();
        if recovered && detached {
            self.attach(epoch.generation, &principal.id).await;
        }
    }

    /// `may(action, resource)` for the current principal, re-resolving the
    /// license status first if it has gone stale. Unknown actions are denied.
    pub async fn has_permission(&self, action: &str, resource: &str) -> bool {
        let Some(action) = Action::parse(action) else {
            tracing::debug!(action, resource, "unknown action denied");
            return false;
        };
        self.ensure_fresh().await;
        self.check(action, resource)
    }

    /// Synchronous decision against the last resolved status.
    pub fn check(&self, action: Action, resource: &str) -> bool {
        self.with_subject(|engine, subject| engine.may(subject, action, resource))
    }

    /// Actions allowed on `resource`.
    pub fn allowed_actions(&self, resource: &str) -> Vec<Action> {
        self.with_subject(|engine, subject| engine.allowed_actions(subject, resource))
    }

    /// Whether `field` is hidden on `resource`.
    pub fn is_field_restricted(&self, resource: &str, field: &str) -> bool {
        self.shared.registry.is_field_restricted(resource, field)
    }

    /// Page size cap for `resource`.
    pub fn max_rows(&self, resource: &str) -> usize {
        self.shared.registry.max_rows(resource)
    }

    /// Filter a navigation tree for the current principal.
    pub fn project_menu(&self, tree: &[MenuItem]) -> Vec<MenuItem> {
        self.with_subject(|engine, subject| {
            menu::project(tree, subject.map(|s| s.status), |action, resource| {
                engine.may(subject, action, resource)
            })
        })
    }

    /// Role, license and coarse rights of the current principal.
    pub fn summarize(&self) -> PermissionSummary {
        self.with_subject(|engine, subject| engine.summarize(subject))
    }

    /// Capabilities on `resource`: registry base, then `overrides`, then the
    /// mask from the principal's program entry for that resource.
    /// A resource tied to a license feature loses read, edit and delete unless
    /// the principal is an admin or holds a valid license listing the feature.
    pub fn capabilities(&self, resource: &str, overrides: &CapabilityOverrides) -> CapabilitySet {
        let mask = {
            let session = self.shared.session.read();
            let status = session.status.as_ref();
            let feature = self
                .shared
                .registry
                .get(resource)
                .and_then(|config| config.licensed_feature_id.as_deref());
            let unlocked = feature.map_or(true, |feature| {
                status.is_some_and(|status| {
                    status.role.is_admin() || (status.is_valid && status.has_feature(feature))
                })
            });
            if unlocked {
                status
                    .and_then(|status| status.programs.get(resource))
                    .map(LicenseCapabilityMask::from_program)
                    .unwrap_or_default()
            } else {
                LicenseCapabilityMask::denied()
            }
        };
        self.shared
            .registry
            .effective_capabilities(resource, overrides, &mask)
    }

    /// Effective program settings: the license override if present, otherwise
    /// the catalog default. `None` without a principal or for unknown programs.
    pub async fn program_access(&self, resource: &str) -> Option<ProgramAccess> {
        let licensed = {
            let session = self.shared.session.read();
            session.principal.as_ref()?;
            session
                .status
                .as_ref()
                .and_then(|status| status.programs.get(resource).cloned())
        };
        if let Some(permission) = licensed {
            return Some(ProgramAccess {
                permission,
                source: ProgramSource::License,
            });
        }

        match self.shared.programs.read().await {
            Ok(catalog) => catalog.get(resource).map(|entry| ProgramAccess {
                permission: ProgramPermission {
                    enabled: entry.default_enabled,
                    permissions: entry.permissions.clone(),
                },
                source: ProgramSource::Catalog,
            }),
            Err(err) => {
                tracing::warn!(resource, error = %err, "program catalog unavailable");
                None
            }
        }
    }

    /// Admins always; otherwise a valid license listing `feature`.
    pub async fn validate_feature_access(&self, feature: &str) -> bool {
        self.ensure_fresh().await;
        let session = self.shared.session.read();
        let Some(status) = &session.status else {
            return false;
        };
        if session.effective_role().is_some_and(|role| role.is_admin()) {
            return true;
        }
        status.is_valid && status.has_feature(feature)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observers and caches
    // ─────────────────────────────────────────────────────────────────────

    /// Register a callback for every new status.
    pub fn subscribe<F>(&self, observer: F) -> ObserverHandle
    where
        F: Fn(&LicenseStatus) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(Arc::new(observer))
    }

    /// Drop both caches and re-resolve the current principal's status.
    pub async fn refresh(&self) -> LicenseStatus {
        let Some((principal, epoch)) = self.current_epoch() else {
            return LicenseStatus::pessimistic();
        };
        self.shared.evaluator.invalidate(&principal.id);
        self.shared.engine.clear();

        let evaluation = self.shared.evaluator.load(&principal).await;
        self.shared.apply(epoch, &principal.id, evaluation, true)
    }

    /// Drop both caches. The last resolved status stays in place until the
    /// next async query re-resolves it.
    pub fn clear_cache(&self) {
        self.shared.evaluator.clear();
        self.shared.engine.clear();
        tracing::debug!("access caches cleared");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Privileged writes
    // ─────────────────────────────────────────────────────────────────────

    /// Merge `patch` into `target`'s license record. Only a `super_admin` may
    /// write; the record is stamped with the acting principal's id.
    pub async fn update_license_status(
        &self,
        target: &str,
        patch: LicensePatch,
    ) -> AuthorizationResult<LicenseRecord> {
        let (actor, role) = {
            let session = self.shared.session.read();
            let actor = session.principal.clone().ok_or(AccError::PrincipalUnknown)?;
            let role = session.effective_role().unwrap_or(actor.role);
            (actor, role)
        };
        if !role.at_least(Role::SuperAdmin) {
            tracing::warn!(actor = %actor.id, %role, target, "license update refused");
            return Err(AccError::permission_denied(format!(
                "{} ({role}) may not update license records",
                actor.id
            )));
        }

        let record = self.shared.licenses.write(target, patch, &actor.id).await?;
        if target != actor.id {
            self.shared.evaluator.invalidate(target);
        }
        tracing::info!(actor = %actor.id, target, is_valid = record.is_valid, "license updated");
        Ok(record)
    }
}

impl fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.shared.session.read();
        f.debug_struct("AccessControl")
            .field("principal", &session.principal.as_ref().map(|p| &p.id))
            .field("generation", &session.generation)
            .field("degraded", &session.degraded)
            .field("engine", &self.shared.engine)
            .finish_non_exhaustive()
    }
}
