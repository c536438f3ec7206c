//! Environment loading and service wiring for a fleetfs node.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetfs_config::NodeSettings;
use fleetfs_core::{
    CollaborationLocation, CollaborationService, NodeTopology, Resolver, StaticTopology,
};
use fleetfs_events::EventBus;
use fleetfs_runtime::{TaskManager, TaskManagerConfig};
use fleetfs_telemetry::{
    GlobalContextGuard, LoggingConfig, Metrics, build_sha, init_logging, log_format_from_str,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::orchestrator::TransferOrchestrator;
use crate::strategies::StrategyDispatcher;

/// How often terminal tasks are swept from the registry.
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);
/// How long a terminal task stays queryable.
const TERMINAL_TASK_RETENTION_HOURS: i64 = 24;

/// Collaboration client used when no service endpoint is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCollaboration;

#[async_trait]
impl CollaborationService for UnconfiguredCollaboration {
    async fn file_size(&self, location: &CollaborationLocation) -> anyhow::Result<u64> {
        Err(unconfigured(location))
    }

    async fn fetch_chunk(
        &self,
        location: &CollaborationLocation,
        _offset: u64,
        _len: usize,
    ) -> anyhow::Result<Vec<u8>> {
        Err(unconfigured(location))
    }

    async fn push_chunk(
        &self,
        location: &CollaborationLocation,
        _offset: u64,
        _bytes: &[u8],
        _last: bool,
    ) -> anyhow::Result<()> {
        Err(unconfigured(location))
    }

    async fn server_side_copy(
        &self,
        from: &CollaborationLocation,
        _to: &CollaborationLocation,
        _is_move: bool,
    ) -> anyhow::Result<()> {
        Err(unconfigured(from))
    }
}

fn unconfigured(location: &CollaborationLocation) -> anyhow::Error {
    anyhow::anyhow!(
        "collaboration service not configured for repository {}",
        location.repo_id
    )
}

/// Every long-lived service a node runs, wired together.
#[derive(Clone)]
pub struct NodeServices {
    /// Settings the node was started with.
    pub settings: Arc<NodeSettings>,
    /// Domain event bus.
    pub events: EventBus,
    /// Metrics registry.
    pub metrics: Metrics,
    /// Task registry and worker pool.
    pub tasks: TaskManager,
    /// Request front door.
    pub orchestrator: TransferOrchestrator,
}

impl NodeServices {
    /// Wire the resolver, strategy dispatcher, task manager and orchestrator.
    #[must_use]
    pub fn build(
        settings: NodeSettings,
        events: EventBus,
        metrics: Metrics,
        collaboration: Arc<dyn CollaborationService>,
    ) -> Self {
        let settings = Arc::new(settings);
        let topology: Arc<dyn NodeTopology> = Arc::new(StaticTopology::new(
            settings.master_node.clone(),
            settings.nodes.iter().cloned(),
        ));
        let resolver = Arc::new(Resolver::new(settings.data_root.clone(), topology));
        let dispatcher = StrategyDispatcher::new(
            Arc::clone(&settings),
            Arc::clone(&resolver),
            collaboration,
        );
        let tasks = TaskManager::new(
            TaskManagerConfig {
                concurrency: settings.worker_concurrency,
            },
            Arc::new(dispatcher),
            events.clone(),
            metrics.clone(),
        );
        let orchestrator = TransferOrchestrator::new(
            Arc::clone(&settings),
            resolver,
            tasks.clone(),
            metrics.clone(),
        );
        Self {
            settings,
            events,
            metrics,
            tasks,
            orchestrator,
        }
    }

    /// Cancel in-flight transfers and wait for every worker to finish.
    pub async fn shutdown(&self) {
        self.tasks.shutdown().await;
    }
}

/// Entry point for the node boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, telemetry or signal handling fails.
pub async fn run_app() -> AppResult<()> {
    let settings =
        NodeSettings::from_env().map_err(|err| AppError::config("settings.from_env", err))?;
    let logging = LoggingConfig {
        level: &settings.log_level,
        format: log_format_from_str(settings.log_format.as_deref()),
        build_sha: build_sha(),
    };
    init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("node");

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let services = NodeServices::build(
        settings,
        EventBus::new(),
        metrics,
        Arc::new(UnconfiguredCollaboration),
    );
    run_until(services, shutdown_signal()).await
}

/// Serve until `shutdown` resolves, then drain the worker pool.
///
/// # Errors
///
/// Returns an error when the shutdown signal itself fails.
pub(crate) async fn run_until<S>(services: NodeServices, shutdown: S) -> AppResult<()>
where
    S: Future<Output = AppResult<()>>,
{
    info!(
        node = %services.settings.node_name,
        master = %services.settings.master_node,
        nodes = services.settings.nodes.len(),
        data_root = %services.settings.data_root.display(),
        worker_concurrency = services.tasks.concurrency(),
        "fleetfs node ready"
    );

    let stop_sweeper = CancellationToken::new();
    let sweeper = spawn_retention_sweeper(services.tasks.clone(), stop_sweeper.clone());

    let signal = shutdown.await;
    if let Err(err) = &signal {
        warn!(error = %err, "shutdown signal failed; stopping anyway");
    }

    info!("shutting down transfer workers");
    stop_sweeper.cancel();
    if let Err(err) = sweeper.await {
        warn!(error = %err, "retention sweeper join failed");
    }
    services.shutdown().await;
    info!("fleetfs node stopped");
    signal
}

fn spawn_retention_sweeper(
    tasks: TaskManager,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let retention = chrono::Duration::hours(TERMINAL_TASK_RETENTION_HOURS);
        let mut ticker = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = tasks.prune_terminal(retention);
                    if removed > 0 {
                        info!(removed, "expired terminal tasks");
                    }
                }
            }
        }
    })
}

async fn shutdown_signal() -> AppResult<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| AppError::Io {
            operation: "signal.ctrl_c",
            source,
        })
}
