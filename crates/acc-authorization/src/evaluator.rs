//! License evaluator
//!
//! Resolves a principal's [`LicenseStatus`]: cache lookup, concurrent fetch of
//! the license record and the stored role, default-record creation on first
//! contact, then a pure derivation. Any storage fault short-circuits to
//! [`LicenseStatus::pessimistic`], which is never cached.

use acc_core::keys::license_cache_key;
use acc_core::{
    AccError, AccessConfig, ClockEffects, LicenseLevel, LicensePatch, LicenseRecord,
    LicenseStatus, Principal, Result, Role,
};
use acc_store::{LicenseStore, UserDirectory};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::permissions::derive_grants;

/// Writer recorded on records the evaluator creates itself.
pub const SYSTEM_ACTOR: &str = "system";

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Effective status
    pub status: LicenseStatus,
    /// Record the status was derived from; `None` for fallbacks
    pub record: Option<LicenseRecord>,
    /// Role the status was derived for
    pub role: Role,
    /// Status is the pessimistic fallback
    pub degraded: bool,
    /// Served from the `license_<id>` cache
    pub cached: bool,
}

impl Evaluation {
    fn fallback(principal: &Principal) -> Self {
        Self {
            status: LicenseStatus::pessimistic(),
            record: None,
            role: principal.role,
            degraded: true,
            cached: false,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedStatus {
    status: LicenseStatus,
    record: LicenseRecord,
    cached_at: DateTime<Utc>,
}

/// License status resolver with its `license_<id>` cache.
pub struct LicenseEvaluator {
    licenses: LicenseStore,
    users: UserDirectory,
    clock: Arc<dyn ClockEffects>,
    ttl: Duration,
    default_features: Vec<String>,
    default_max_users: u32,
    cache: Mutex<HashMap<String, CachedStatus>>,
}

impl LicenseEvaluator {
    /// Evaluator over the given stores.
    pub fn new(
        licenses: LicenseStore,
        users: UserDirectory,
        clock: Arc<dyn ClockEffects>,
        config: &AccessConfig,
    ) -> Self {
        Self {
            licenses,
            users,
            clock,
            ttl: config.license_ttl(),
            default_features: config.default_features.clone(),
            default_max_users: config.default_max_users,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Pure derivation of a status from a record and role at `now`.
    pub fn derive(record: &LicenseRecord, role: Role, now: DateTime<Utc>) -> LicenseStatus {
        let license_type = record.tier();
        LicenseStatus {
            is_valid: record.is_valid_at(now),
            level: LicenseLevel::resolve(&license_type, role),
            expiry_date: record.expiry_date,
            features: record.features.clone(),
            permissions: derive_grants(record, role),
            license_type,
            max_users: record.max_users,
            role,
            programs: record.program_permissions.clone(),
        }
    }

    /// Resolve the status for `principal` and cache it. Never fails; faults
    /// degrade.
    pub async fn evaluate(&self, principal: &Principal) -> Evaluation {
        let evaluation = self.load(principal).await;
        self.accept(&principal.id, &evaluation);
        evaluation
    }

    /// Resolve the status for `principal` without touching the cache on a
    /// miss. Pair with [`LicenseEvaluator::accept`] once the caller knows the
    /// result is still current.
    pub async fn load(&self, principal: &Principal) -> Evaluation {
        if let Some(hit) = self.fresh_entry(&principal.id) {
            tracing::trace!(principal = %principal.id, cache = "hit", "license status");
            return Evaluation {
                role: hit.status.role,
                status: hit.status,
                record: Some(hit.record),
                degraded: false,
                cached: true,
            };
        }

        match self.resolve(principal).await {
            Ok((record, role)) => {
                let now = self.clock.now();
                let status = Self::derive(&record, role, now);
                tracing::debug!(
                    principal = %principal.id,
                    %role,
                    level = ?status.level,
                    is_valid = status.is_valid,
                    "license status derived"
                );
                Evaluation {
                    status,
                    record: Some(record),
                    role,
                    degraded: false,
                    cached: false,
                }
            }
            Err(err) => {
                tracing::warn!(
                    principal = %principal.id,
                    error = %err,
                    transient = err.is_transient(),
                    "license evaluation failed, using pessimistic status"
                );
                Evaluation::fallback(principal)
            }
        }
    }

    async fn resolve(&self, principal: &Principal) -> Result<(LicenseRecord, Role)> {
        let id = principal.id.as_str();
        let (record, user) = futures::join!(self.licenses.try_read(id), self.users.read(id));

        let role = user?.map_or(principal.role, |user| user.role);
        let record = match record {
            Ok(Some(record)) => record,
            Ok(None) => self.create_default(id).await?,
            Err(AccError::MalformedRecord { key, message }) => {
                tracing::warn!(%key, %message, "malformed license record evaluates as invalid");
                LicenseRecord::default()
            }
            Err(err) => return Err(err),
        };
        Ok((record, role))
    }

    async fn create_default(&self, id: &str) -> Result<LicenseRecord> {
        let record = LicenseRecord::default_free(
            self.clock.now(),
            self.default_features.clone(),
            self.default_max_users,
        );
        self.licenses
            .write(id, LicensePatch::from(record), SYSTEM_ACTOR)
            .await?;
        tracing::info!(principal = %id, "created default license record");
        self.licenses
            .try_read(id)
            .await?
            .ok_or_else(|| AccError::record_missing(id))
    }

    /// `admin`/`super_admin` always; otherwise a valid license listing `feature`.
    pub async fn validate_feature_access(&self, principal: &Principal, feature: &str) -> bool {
        let evaluation = self.evaluate(principal).await;
        if evaluation.role.is_admin() {
            return true;
        }
        evaluation.status.is_valid && evaluation.status.has_feature(feature)
    }

    /// Cache a freshly resolved evaluation. Cache hits and fallbacks are left
    /// alone.
    pub fn accept(&self, id: &str, evaluation: &Evaluation) {
        if evaluation.cached || evaluation.degraded {
            return;
        }
        if let Some(record) = &evaluation.record {
            self.prime(id, record.clone(), evaluation.status.clone());
        }
    }

    /// Store a derived status as the fresh `license_<id>` entry.
    pub fn prime(&self, id: &str, record: LicenseRecord, status: LicenseStatus) {
        self.cache.lock().insert(
            license_cache_key(id),
            CachedStatus {
                status,
                record,
                cached_at: self.clock.now(),
            },
        );
    }

    /// Whether a fresh entry exists for `id`.
    pub fn is_fresh(&self, id: &str) -> bool {
        self.fresh_entry(id).is_some()
    }

    fn fresh_entry(&self, id: &str) -> Option<CachedStatus> {
        let now = self.clock.now();
        self.cache
            .lock()
            .get(&license_cache_key(id))
            .filter(|entry| now - entry.cached_at < self.ttl)
            .cloned()
    }

    /// Drop the entry for `id`.
    pub fn invalidate(&self, id: &str) {
        self.cache.lock().remove(&license_cache_key(id));
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl std::fmt::Debug for LicenseEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseEvaluator")
            .field("ttl", &self.ttl)
            .field("entries", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}
