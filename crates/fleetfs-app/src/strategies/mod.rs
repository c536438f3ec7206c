//! Strategy dispatch for the worker pool.
//!
//! # Design
//! - `StrategyDispatcher::run` is the one place a [`Strategy`] is matched to code.
//! - Adapters resolve descriptors lazily so a resolve failure becomes the task's
//!   failure reason rather than a planning error.
//! - Executor errors are folded into [`TransferError`] here; `Canceled` stays distinct.

mod cloud;
mod collaboration;
mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fleetfs_config::NodeSettings;
use fleetfs_core::{
    AddressError, CollaborationLocation, CollaborationService, RemoteEndpoint, ResolvedRoot,
    ResourceDescriptor, Resolver, Strategy, TransferError, TransferOutcome, TransferResult,
};
use fleetfs_fsops::{CloudPath, FsOpsError, TransferExecutor};
use fleetfs_runtime::{TaskContext, TransferJob, TransferRunner};

/// Routes each task to the adapter for its strategy.
pub struct StrategyDispatcher {
    settings: Arc<NodeSettings>,
    resolver: Arc<Resolver>,
    executor: TransferExecutor,
    collaboration: Arc<dyn CollaborationService>,
}

impl StrategyDispatcher {
    /// Build a dispatcher for this node.
    #[must_use]
    pub fn new(
        settings: Arc<NodeSettings>,
        resolver: Arc<Resolver>,
        collaboration: Arc<dyn CollaborationService>,
    ) -> Self {
        Self {
            settings,
            resolver,
            executor: TransferExecutor::default(),
            collaboration,
        }
    }

    /// Replace the transfer executor, e.g. to tune the reap interval.
    #[must_use]
    pub const fn with_executor(mut self, executor: TransferExecutor) -> Self {
        self.executor = executor;
        self
    }

    fn resolve(&self, descriptor: &ResourceDescriptor) -> TransferResult<ResolvedRoot> {
        self.resolver
            .resolve(descriptor)
            .map_err(|err| TransferError::failed("resolve", err))
    }

    fn local_path(&self, descriptor: &ResourceDescriptor, subpath: &str) -> TransferResult<PathBuf> {
        self.resolve(descriptor)?
            .local_path(subpath)
            .ok_or_else(|| wrong_backend(descriptor, "not_local"))
    }

    fn cloud_path(&self, descriptor: &ResourceDescriptor, subpath: &str) -> TransferResult<CloudPath> {
        match self.resolve(descriptor)? {
            ResolvedRoot::Remote(RemoteEndpoint::Cloud { remote }) => {
                Ok(CloudPath::new(remote, subpath))
            }
            _ => Err(wrong_backend(descriptor, "not_cloud")),
        }
    }

    fn collaboration_location(
        &self,
        descriptor: &ResourceDescriptor,
        subpath: &str,
    ) -> TransferResult<CollaborationLocation> {
        match self.resolve(descriptor)? {
            ResolvedRoot::Remote(RemoteEndpoint::Collaboration { repo_id }) => {
                Ok(CollaborationLocation::new(repo_id, subpath))
            }
            _ => Err(wrong_backend(descriptor, "not_collaboration")),
        }
    }
}

#[async_trait]
impl TransferRunner for StrategyDispatcher {
    async fn run(&self, job: &TransferJob, ctx: TaskContext) -> TransferResult<TransferOutcome> {
        match job.strategy {
            Strategy::LocalSync | Strategy::PullFromNode => sync::run(self, job, &ctx).await,
            Strategy::PushToCloud => cloud::push(self, job, &ctx).await,
            Strategy::PullFromCloud => cloud::pull(self, job, &ctx).await,
            Strategy::CloudServerSideCopy => cloud::server_side_copy(self, job, &ctx).await,
            Strategy::PushToCollaboration => collaboration::push(self, job, &ctx).await,
            Strategy::PullFromCollaboration => collaboration::pull(self, job, &ctx).await,
            Strategy::CollaborationServerSideCopy => {
                collaboration::server_side_copy(self, job, &ctx).await
            }
        }
    }
}

fn wrong_backend(descriptor: &ResourceDescriptor, reason: &'static str) -> TransferError {
    TransferError::failed(
        "resolve",
        AddressError::InvalidAddress {
            path: descriptor.to_string(),
            reason,
        },
    )
}

/// Fold an executor error into a strategy outcome.
pub(crate) fn transfer_error(operation: &'static str, err: FsOpsError) -> TransferError {
    match err {
        FsOpsError::Canceled => TransferError::Canceled,
        FsOpsError::InsufficientSpace { .. } => TransferError::InsufficientSpace {
            detail: err.detail().unwrap_or_default(),
        },
        other => match other.detail() {
            Some(detail) => TransferError::failed_with_detail(operation, detail, other),
            None => TransferError::failed(operation, other),
        },
    }
}

/// Whole percentage of `done` over `total`; an empty payload is complete.
pub(crate) fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = u128::from(done.min(total)) * 100 / u128::from(total);
    u8::try_from(scaled).unwrap_or(100)
}

async fn ensure_parent(path: &std::path::Path) -> TransferResult<()> {
    if let Some(parent) = fleetfs_fsops::destination_parent(path) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| TransferError::failed("create_destination_parent", err))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetfs_core::render_error_chain;

    #[test]
    fn executor_errors_keep_their_detail() {
        let err = transfer_error(
            "sync",
            FsOpsError::TransferFailed {
                program: "rsync".into(),
                code: Some(23),
                detail: "rsync error: some files vanished".into(),
            },
        );
        assert_eq!(
            render_error_chain(&err),
            "transfer failed: transfer tool failed: exit code 23: rsync error: some files vanished"
        );
        assert!(transfer_error("sync", FsOpsError::Canceled).is_canceled());

        let space = transfer_error(
            "preflight",
            FsOpsError::InsufficientSpace {
                path: "/data".into(),
                required: 2048,
                available: 1024,
                reserved: 0,
            },
        );
        assert!(matches!(space, TransferError::InsufficientSpace { .. }));
    }

    #[test]
    fn percentages_are_clamped() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(500, 200), 100);
        assert_eq!(percent_of(u64::MAX - 1, u64::MAX), 99);
    }
}
