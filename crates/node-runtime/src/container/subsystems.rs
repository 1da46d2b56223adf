//! # Federation Container
//!
//! Opens the ledger and wires every subsystem onto it.
//!
//! ## Initialization Order
//!
//! ```text
//! Phase 1: Ledger (memory, or RocksDB under a locked data directory)
//! Phase 2: Event bus
//! Phase 3: Agreement validator (registry or permissive)
//! Phase 4: Coordinator (fl-02..fl-05) and reporting (fl-06)
//! ```
//!
//! All subsystems share one `Arc<dyn LedgerStore>`; concurrent operations are
//! serialized by the ledger's optimistic commit check, not by locks here.

use std::sync::Arc;

use fl_01_ledger::LedgerStore;
use fl_05_session_manager::{
    AgreementMode, AgreementValidator, CoordinatorConfig, CoordinatorDeps, FederationCoordinator,
    LedgerAgreementRegistry, PermissiveAgreementValidator,
};
use fl_06_reporting::{AnomalyReporting, StatsQuery};
use shared_bus::InMemoryEventBus;
use shared_types::{
    FlError, IdGenerator, IdentityResolver, SystemTimeSource, TimeSource,
    TrustedPrincipalResolver, UuidIdGenerator,
};
use tracing::{info, instrument};

use crate::container::config::{LedgerBackend, NodeConfig};
use crate::error::NodeError;
use crate::retry::retry_on_conflict;
use crate::storage::DataDirLock;

/// Host-supplied ports. Defaults trust principals as org ids and use UUID
/// session ids with the system clock.
#[derive(Clone)]
pub struct RuntimePorts {
    pub identity: Arc<dyn IdentityResolver>,
    pub ids: Arc<dyn IdGenerator>,
    pub time: Arc<dyn TimeSource>,
}

impl Default for RuntimePorts {
    fn default() -> Self {
        Self {
            identity: Arc::new(TrustedPrincipalResolver),
            ids: Arc::new(UuidIdGenerator),
            time: Arc::new(SystemTimeSource),
        }
    }
}

/// Every subsystem of one node.
pub struct FederationContainer {
    pub config: NodeConfig,
    pub ledger: Arc<dyn LedgerStore>,
    pub event_bus: Arc<InMemoryEventBus>,
    /// Present in registry mode, for the host's agreement workflow.
    pub agreements: Option<Arc<LedgerAgreementRegistry>>,
    pub coordinator: FederationCoordinator,
    pub stats: StatsQuery,
    pub reporting: AnomalyReporting,
    _data_lock: Option<DataDirLock>,
}

impl FederationContainer {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        Self::with_ports(config, RuntimePorts::default())
    }

    #[instrument(name = "federation_init", skip(config, ports))]
    pub fn with_ports(config: NodeConfig, ports: RuntimePorts) -> Result<Self, NodeError> {
        config.validate()?;

        info!("Phase 1: Opening {} ledger", config.storage.backend);
        let (ledger, data_lock) = open_ledger(&config)?;

        info!("Phase 2: Creating event bus (capacity {})", config.events.capacity);
        let event_bus = Arc::new(InMemoryEventBus::with_capacity(config.events.capacity));

        info!(
            "Phase 3: Agreement validation in {} mode",
            config.federation.agreement_mode
        );
        let agreements = match config.federation.agreement_mode {
            AgreementMode::Registry => {
                Some(Arc::new(LedgerAgreementRegistry::new(ledger.clone())))
            }
            AgreementMode::Permissive => None,
        };
        let validator: Arc<dyn AgreementValidator> = match &agreements {
            Some(registry) => registry.clone(),
            None => Arc::new(PermissiveAgreementValidator),
        };

        info!("Phase 4: Wiring coordinator and reporting");
        let deps = CoordinatorDeps::new(ledger.clone(), event_bus.clone())
            .with_identity(ports.identity.clone())
            .with_agreements(validator)
            .with_ids(ports.ids)
            .with_time(ports.time.clone());
        let coordinator = FederationCoordinator::new(
            deps,
            CoordinatorConfig::with_admins(config.federation.admin_orgs.iter().cloned()),
        );
        let stats = StatsQuery::new(ledger.clone(), ports.time.clone());
        let reporting = AnomalyReporting::new(
            ledger.clone(),
            ports.identity,
            event_bus.clone(),
            ports.time,
        );

        info!("  [05] Session manager ready");
        info!("  [06] Reporting ready");
        Ok(Self {
            config,
            ledger,
            event_bus,
            agreements,
            coordinator,
            stats,
            reporting,
            _data_lock: data_lock,
        })
    }

    /// Create the configured global budgets. Safe to call on every start.
    pub fn bootstrap(&self) -> Result<Vec<String>, NodeError> {
        let orgs = &self.config.federation.bootstrap_orgs;
        if orgs.is_empty() {
            return Ok(Vec::new());
        }
        let created = self.retry(|| {
            self.coordinator
                .bootstrap_global_budgets(orgs, self.config.federation.global_budget)
        })?;
        info!(
            "Bootstrapped {} global budgets ({} already present)",
            created.len(),
            orgs.len() - created.len()
        );
        Ok(created)
    }

    /// Run `op`, re-running it on concurrency conflicts up to the configured
    /// number of attempts.
    pub fn retry<T>(&self, op: impl FnMut() -> Result<T, FlError>) -> Result<T, FlError> {
        retry_on_conflict(self.config.federation.commit_retries, op)
    }
}

fn open_ledger(
    config: &NodeConfig,
) -> Result<(Arc<dyn LedgerStore>, Option<DataDirLock>), NodeError> {
    match config.storage.backend {
        LedgerBackend::Memory => {
            let ledger: Arc<dyn LedgerStore> = Arc::new(fl_01_ledger::InMemoryLedger::new());
            Ok((ledger, None))
        }
        LedgerBackend::RocksDb => open_rocksdb(config),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(
    config: &NodeConfig,
) -> Result<(Arc<dyn LedgerStore>, Option<DataDirLock>), NodeError> {
    use fl_01_ledger::{RocksDbLedger, RocksDbLedgerConfig};

    let data_dir = &config.storage.data_dir;
    let lock = DataDirLock::acquire(data_dir)?;
    crate::storage::ensure_disk_space(data_dir, config.storage.min_disk_space_percent)?;

    let ledger: Arc<dyn LedgerStore> = Arc::new(RocksDbLedger::open(RocksDbLedgerConfig {
        path: data_dir.join("ledger"),
        ..RocksDbLedgerConfig::default()
    })?);
    info!("  RocksDB ledger at {:?}", data_dir.join("ledger"));
    Ok((ledger, Some(lock)))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(
    _config: &NodeConfig,
) -> Result<(Arc<dyn LedgerStore>, Option<DataDirLock>), NodeError> {
    Err(crate::container::ConfigError::BackendUnavailable(LedgerBackend::RocksDb).into())
}
