//! # Federation Node
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Open the ledger and wire subsystems
//! 3. Create configured global budgets
//! 4. Start the event listener
//! 5. Optionally run the demo federation (`FL_DEMO=1`)
//! 6. Wait for Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use shared_bus::EventFilter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::demo::run_demo;
use node_runtime::{EventStats, FederationContainer, FederationEventListener, NodeConfig};

/// Running node: the container plus its background tasks.
pub struct NodeRuntime {
    container: Arc<FederationContainer>,
    stats: Arc<EventStats>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let container = FederationContainer::new(config).context("failed to initialize node")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            container: Arc::new(container),
            stats: Arc::new(EventStats::new()),
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        })
    }

    pub fn start(&mut self) -> Result<()> {
        info!("Starting federation node");
        self.container.bootstrap().context("failed to bootstrap budgets")?;

        let listener = FederationEventListener::new(
            self.container.event_bus.subscribe(EventFilter::all()),
            self.stats.clone(),
        );
        let mut shutdown = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = listener.run() => {}
                _ = shutdown.changed() => {
                    info!("[bus] Listener received shutdown");
                }
            }
        }));

        info!(
            "Node ready ({} ledger, {} agreement mode)",
            self.container.config.storage.backend, self.container.config.federation.agreement_mode
        );
        Ok(())
    }

    /// Runs on a blocking thread; ledger operations are synchronous.
    pub async fn run_demo(&self) -> Result<()> {
        let container = self.container.clone();
        let summary = tokio::task::spawn_blocking(move || run_demo(&container))
            .await
            .context("demo task panicked")??;

        info!("Demo session {} finished", summary.session_id);
        println!("{}", serde_json::to_string_pretty(&summary.progress)?);
        println!("{}", serde_json::to_string_pretty(&summary.stats)?);
        Ok(())
    }

    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Background task failed: {}", e);
            }
        }
        info!(
            "Shutdown complete ({} events observed)",
            self.stats.total()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env().context("invalid configuration")?;

    let mut runtime = NodeRuntime::new(config)?;
    runtime.start()?;

    if std::env::var("FL_DEMO").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
        runtime.run_demo().await?;
    }

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
