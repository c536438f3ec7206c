//! Request planning: addressing, placement, preflight and task submission.
//!
//! # Design
//! - Requests are rejected before a task exists when the path is invalid, the
//!   request belongs on another node, or the destination lacks room.
//! - Task control operations delegate to the [`TaskManager`] and only add error context.

use std::sync::Arc;

use fleetfs_config::NodeSettings;
use fleetfs_core::{
    Action, Placement, PlacementContext, ResourceDescriptor, Resolver, TaskSnapshot, TaskState,
    TransferRequest, decide,
};
use fleetfs_fsops::{SpaceCheck, SpacePreflight, measure_tree};
use fleetfs_runtime::TaskManager;
use fleetfs_telemetry::Metrics;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Front door for transfer requests served by this node.
#[derive(Clone)]
pub struct TransferOrchestrator {
    settings: Arc<NodeSettings>,
    resolver: Arc<Resolver>,
    preflight: SpacePreflight,
    tasks: TaskManager,
    metrics: Metrics,
}

impl TransferOrchestrator {
    /// Build an orchestrator reserving the configured disk-space margin.
    #[must_use]
    pub fn new(
        settings: Arc<NodeSettings>,
        resolver: Arc<Resolver>,
        tasks: TaskManager,
        metrics: Metrics,
    ) -> Self {
        let preflight = SpacePreflight::new(settings.reserved_space_bytes());
        Self {
            settings,
            resolver,
            preflight,
            tasks,
            metrics,
        }
    }

    /// Replace the disk-space preflight.
    #[must_use]
    pub fn with_preflight(mut self, preflight: SpacePreflight) -> Self {
        self.preflight = preflight;
        self
    }

    /// Task registry backing this orchestrator.
    #[must_use]
    pub const fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Parse both paths and decide where and how the transfer runs.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Address`] for malformed paths and [`AppError::Placement`] for
    /// unsupported routes or requests that must run on another node.
    pub fn plan(
        &self,
        owner: &str,
        action: Action,
        source: &str,
        destination: &str,
    ) -> AppResult<(Placement, TransferRequest)> {
        let topology = self.resolver.topology();
        let source = ResourceDescriptor::parse(owner, source, topology.as_ref())
            .map_err(|err| AppError::address("parse.source", err))?;
        let destination = ResourceDescriptor::parse(owner, destination, topology.as_ref())
            .map_err(|err| AppError::address("parse.destination", err))?;

        let master = topology.master();
        let placement = decide(
            action,
            &source,
            &destination,
            PlacementContext {
                current_node: &self.settings.node_name,
                master_node: &master,
            },
        )
        .map_err(|err| self.rejected("placement.decide", err))?;
        placement
            .ensure_runs_on(&self.settings.node_name)
            .map_err(|err| self.rejected("placement.ensure_runs_on", err))?;

        Ok((
            placement,
            TransferRequest {
                owner: owner.to_string(),
                action,
                source,
                destination,
            },
        ))
    }

    /// Check the destination filesystem has room for the source payload.
    ///
    /// Returns `None` when the destination is not written on this node. The source
    /// tree is measured on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::FsOps`] wrapping `InsufficientSpace` when the payload does not fit,
    /// or the underlying failure when the source cannot be measured.
    pub async fn preflight(
        &self,
        placement: &Placement,
        request: &TransferRequest,
    ) -> AppResult<Option<SpaceCheck>> {
        if !placement.writes_locally() {
            return Ok(None);
        }
        let target = self
            .resolver
            .resolve(&request.destination)
            .map_err(|err| AppError::address("resolve.destination", err))?
            .local_path(&request.destination_subpath());
        let Some(target) = target else {
            return Ok(None);
        };
        let required = if placement.reads_locally() {
            let source = self
                .resolver
                .local_path(&request.source)
                .map_err(|err| AppError::address("resolve.source", err))?;
            match source {
                Some(path) => measure_tree(path)
                    .await
                    .map_err(|err| AppError::fsops("preflight.source_size", err))?,
                None => 0,
            }
        } else {
            0
        };

        let check = self
            .preflight
            .check_space(&target, required)
            .map_err(|err| AppError::fsops("preflight.check_space", err))?;
        if !check.ok {
            self.metrics.inc_preflight_rejection();
            warn!(
                owner = %request.owner,
                target = %target.display(),
                detail = %check.describe(),
                "preflight rejected transfer"
            );
        }
        check
            .ensure(&target)
            .map(Some)
            .map_err(|err| AppError::fsops("preflight.check_space", err))
    }

    /// Plan, preflight, register and start a transfer; returns the `Pending` snapshot.
    ///
    /// # Errors
    ///
    /// Propagates planning and preflight rejections, and task registry failures.
    pub async fn submit(
        &self,
        owner: &str,
        action: Action,
        source: &str,
        destination: &str,
    ) -> AppResult<TaskSnapshot> {
        let (placement, request) = self.plan(owner, action, source, destination)?;
        self.preflight(&placement, &request).await?;
        let snapshot = self
            .tasks
            .create_task(&placement, request)
            .map_err(|err| AppError::task("tasks.create", err))?;
        self.tasks
            .run(&snapshot.id)
            .map_err(|err| AppError::task("tasks.run", err))?;
        info!(
            task_id = %snapshot.id,
            owner,
            strategy = placement.strategy.as_str(),
            "transfer submitted"
        );
        Ok(snapshot)
    }

    /// Tasks visible to `owner`; see [`TaskManager::get_task`].
    #[must_use]
    pub fn get_task(
        &self,
        owner: &str,
        task_id: Option<&str>,
        status: Option<TaskState>,
    ) -> Vec<TaskSnapshot> {
        self.tasks.get_task(owner, task_id, status)
    }

    /// Cancel one task or all of `owner`'s tasks.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] when the task is unknown to `owner`.
    pub fn cancel_task(&self, owner: &str, task_id: &str, all: bool) -> AppResult<usize> {
        self.tasks
            .cancel_task(owner, task_id, all)
            .map_err(|err| AppError::task("tasks.cancel", err))
    }

    /// Pause a chunked transfer at its next checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] when the task cannot pause.
    pub fn pause_task(&self, owner: &str, task_id: &str) -> AppResult<()> {
        self.tasks
            .pause_task(owner, task_id)
            .map_err(|err| AppError::task("tasks.pause", err))
    }

    /// Resume a paused transfer from its checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] unless the task is paused.
    pub fn resume_task(&self, owner: &str, task_id: &str) -> AppResult<()> {
        self.tasks
            .resume_task(owner, task_id)
            .map_err(|err| AppError::task("tasks.resume", err))
    }

    fn rejected(&self, operation: &'static str, err: fleetfs_core::PlacementError) -> AppError {
        self.metrics.inc_placement_rejection(err.reason());
        warn!(reason = err.reason(), error = %err, "placement rejected request");
        AppError::placement(operation, err)
    }
}
