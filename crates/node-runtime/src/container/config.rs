//! # Node Configuration
//!
//! Defaults suitable for a local demo, overridable from the environment.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `FL_LEDGER_BACKEND` | `storage.backend` (`memory` / `rocksdb`) | `memory` |
//! | `FL_DATA_DIR` | `storage.data_dir` | `./data` |
//! | `FL_ADMIN_ORGS` | `federation.admin_orgs` (comma separated) | none |
//! | `FL_BOOTSTRAP_ORGS` | `federation.bootstrap_orgs` (comma separated) | none |
//! | `FL_GLOBAL_BUDGET` | `federation.global_budget` | `10.0` |
//! | `FL_AGREEMENT_MODE` | `federation.agreement_mode` (`registry` / `permissive`) | `registry` |
//! | `FL_EVENT_CAPACITY` | `events.capacity` | `1000` |
//! | `FL_COMMIT_RETRIES` | `federation.commit_retries` | `3` |

use fl_02_privacy_budget::DEFAULT_GLOBAL_BUDGET;
use fl_05_session_manager::AgreementMode;
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use shared_types::{validate_component, OrgId};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub storage: StorageConfig,
    pub federation: FederationConfig,
    pub events: EventConfig,
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("ledger backend '{0}' is not compiled in (enable the `rocksdb` feature)")]
    BackendUnavailable(LedgerBackend),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerBackend {
    #[default]
    Memory,
    RocksDb,
}

impl LedgerBackend {
    #[must_use]
    pub fn is_available(self) -> bool {
        match self {
            Self::Memory => true,
            Self::RocksDb => cfg!(feature = "rocksdb"),
        }
    }
}

impl FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::RocksDb),
            other => Err(format!("unknown backend '{other}', expected memory or rocksdb")),
        }
    }
}

impl fmt::Display for LedgerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::RocksDb => f.write_str("rocksdb"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: LedgerBackend,
    /// Holds the ledger and the lock file. Unused by the memory backend.
    pub data_dir: PathBuf,
    /// Minimum free disk space percentage required to open a persistent ledger.
    pub min_disk_space_percent: u8,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Memory,
            data_dir: PathBuf::from("./data"),
            min_disk_space_percent: 5,
        }
    }
}

/// Coordinator policy and bootstrap parameters.
#[derive(Debug, Clone)]
pub struct FederationConfig {
    pub admin_orgs: Vec<OrgId>,
    /// Organizations given a global budget at startup.
    pub bootstrap_orgs: Vec<OrgId>,
    pub global_budget: f64,
    pub agreement_mode: AgreementMode,
    /// Attempts per operation when the ledger reports a concurrency conflict.
    pub commit_retries: u32,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            admin_orgs: Vec::new(),
            bootstrap_orgs: Vec::new(),
            global_budget: DEFAULT_GLOBAL_BUDGET,
            agreement_mode: AgreementMode::Registry,
            commit_retries: 3,
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone)]
pub struct EventConfig {
    pub capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by the process environment, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by `lookup`, then validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("FL_LEDGER_BACKEND") {
            config.storage.backend = parse("FL_LEDGER_BACKEND", &value)?;
        }
        if let Some(value) = lookup("FL_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("FL_ADMIN_ORGS") {
            config.federation.admin_orgs = org_list(&value);
        }
        if let Some(value) = lookup("FL_BOOTSTRAP_ORGS") {
            config.federation.bootstrap_orgs = org_list(&value);
        }
        if let Some(value) = lookup("FL_GLOBAL_BUDGET") {
            config.federation.global_budget = parse("FL_GLOBAL_BUDGET", &value)?;
        }
        if let Some(value) = lookup("FL_AGREEMENT_MODE") {
            config.federation.agreement_mode = value.parse().map_err(|e: shared_types::FlError| {
                ConfigError::InvalidValue {
                    var: "FL_AGREEMENT_MODE",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup("FL_EVENT_CAPACITY") {
            config.events.capacity = parse("FL_EVENT_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("FL_COMMIT_RETRIES") {
            config.federation.commit_retries = parse("FL_COMMIT_RETRIES", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.backend.is_available() {
            return Err(ConfigError::BackendUnavailable(self.storage.backend));
        }
        if self.storage.min_disk_space_percent > 100 {
            return Err(ConfigError::Invalid(
                "min_disk_space_percent must be at most 100".into(),
            ));
        }
        let budget = self.federation.global_budget;
        if !budget.is_finite() || budget < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "global budget {budget} must be a finite, non-negative number"
            )));
        }
        if self.federation.commit_retries == 0 {
            return Err(ConfigError::Invalid("commit_retries must be at least 1".into()));
        }
        if self.events.capacity == 0 {
            return Err(ConfigError::Invalid("event capacity must be positive".into()));
        }
        for org in self
            .federation
            .admin_orgs
            .iter()
            .chain(&self.federation.bootstrap_orgs)
        {
            validate_component("org_id", org).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn org_list(value: &str) -> Vec<OrgId> {
    value
        .split(',')
        .map(str::trim)
        .filter(|org| !org.is_empty())
        .map(str::to_string)
        .collect()
}
