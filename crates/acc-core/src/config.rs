//! Engine configuration
//!
//! `AccessConfig` carries the cache horizons and first-contact defaults. It
//! loads from JSON, can be overridden from `ACC_*` environment variables and
//! must pass [`ConfigValidation::validate`] before use.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{AccError, Result};

/// Environment variable prefix for overrides, e.g. `ACC_LICENSE_TTL_SECS`.
pub const ENV_PREFIX: &str = "ACC_";

/// Longest accepted cache horizon: one year.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

const KEYS: [&str; 6] = [
    "license_ttl_secs",
    "decision_ttl_secs",
    "default_max_rows",
    "storage_timeout_ms",
    "default_features",
    "default_max_users",
];

/// Trait for configuration validation
pub trait ConfigValidation {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Access control engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Freshness horizon of a cached license status
    pub license_ttl_secs: u64,
    /// Freshness horizon of a cached decision
    pub decision_ttl_secs: u64,
    /// Row cap for resources without an explicit `maxRows`
    pub default_max_rows: usize,
    /// Upper bound on any single storage call
    pub storage_timeout_ms: u64,
    /// Features granted by the auto-created free license
    pub default_features: Vec<String>,
    /// Seat count of the auto-created free license
    pub default_max_users: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            license_ttl_secs: 300,
            decision_ttl_secs: 120,
            default_max_rows: 25,
            storage_timeout_ms: 5_000,
            default_features: vec![
                "bug_bounty".to_string(),
                "task_voting".to_string(),
                "core_dashboard".to_string(),
            ],
            default_max_users: 3,
        }
    }
}

impl AccessConfig {
    /// License status cache horizon.
    pub fn license_ttl(&self) -> chrono::Duration {
        seconds(self.license_ttl_secs)
    }

    /// Decision cache horizon.
    pub fn decision_ttl(&self) -> chrono::Duration {
        seconds(self.decision_ttl_secs)
    }

    /// Storage call timeout.
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AccError::invalid(format!("Failed to read config file: {e}")))?;
        let config: AccessConfig = serde_json::from_str(&content)
            .map_err(|e| AccError::invalid(format!("Invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ACC_*` overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit variable list. Variables without the
    /// prefix, or naming no config field, are ignored.
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_lowercase();
            if !KEYS.contains(&field.as_str()) {
                tracing::debug!(variable = %key, "ignoring unrelated environment variable");
                continue;
            }
            self.set_from_string(&field, &value)?;
        }
        Ok(())
    }

    /// Set one field from its string form.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "license_ttl_secs" => self.license_ttl_secs = parse_field(key, value)?,
            "decision_ttl_secs" => self.decision_ttl_secs = parse_field(key, value)?,
            "default_max_rows" => self.default_max_rows = parse_field(key, value)?,
            "storage_timeout_ms" => self.storage_timeout_ms = parse_field(key, value)?,
            "default_max_users" => self.default_max_users = parse_field(key, value)?,
            "default_features" => {
                self.default_features = value
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            other => {
                return Err(AccError::invalid(format!("Unknown config key: {other}")));
            }
        }
        Ok(())
    }
}

impl ConfigValidation for AccessConfig {
    fn validate(&self) -> Result<()> {
        if self.license_ttl_secs == 0 || self.decision_ttl_secs == 0 {
            return Err(AccError::invalid("cache TTLs must be non-zero"));
        }
        if self.license_ttl_secs > MAX_TTL_SECS {
            return Err(AccError::invalid(format!(
                "license_ttl_secs must not exceed {MAX_TTL_SECS}"
            )));
        }
        if self.decision_ttl_secs > self.license_ttl_secs {
            return Err(AccError::invalid(
                "decision TTL must not exceed license TTL",
            ));
        }
        if self.default_max_rows == 0 {
            return Err(AccError::invalid("default_max_rows must be non-zero"));
        }
        if self.storage_timeout_ms == 0 {
            return Err(AccError::invalid("storage_timeout_ms must be non-zero"));
        }
        Ok(())
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AccError::invalid(format!("Invalid value for {key}: '{value}'")))
}
