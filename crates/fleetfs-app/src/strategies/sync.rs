//! Synchronization-tool strategies: `LocalSync` and `PullFromNode`.

use std::path::PathBuf;

use fleetfs_core::{PeerNode, PeerRole, TransferOutcome, TransferResult};
use fleetfs_fsops::{CommandSpec, RsyncRecognizer, SyncEndpoint, SyncPlan, sync_args};
use fleetfs_runtime::{TaskContext, TransferJob};
use tracing::debug;

use super::{StrategyDispatcher, ensure_parent, transfer_error};

pub(super) async fn run(
    dispatcher: &StrategyDispatcher,
    job: &TransferJob,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let request = &job.request;
    let source = dispatcher.local_path(&request.source, &request.source.path)?;
    let destination =
        dispatcher.local_path(&request.destination, &request.destination_subpath())?;

    let (source, destination) = match &job.peer {
        None => (
            SyncEndpoint::local(contents_of(source).await),
            SyncEndpoint::local(destination),
        ),
        Some(PeerNode {
            node,
            role: PeerRole::Source,
        }) => (
            SyncEndpoint::remote(dispatcher.settings.host_for(node), source),
            SyncEndpoint::local(destination),
        ),
        Some(PeerNode {
            node,
            role: PeerRole::Destination,
        }) => (
            SyncEndpoint::local(contents_of(source).await),
            SyncEndpoint::remote(dispatcher.settings.host_for(node), destination),
        ),
    };
    if destination.host.is_none() {
        ensure_parent(&destination.path).await?;
    }

    let plan = SyncPlan {
        source,
        destination,
        remove_source: request.action.removes_source(),
    };
    let spec = CommandSpec::new(&dispatcher.settings.tools.rsync, sync_args(&plan));
    debug!(
        source = %plan.source.path.display(),
        destination = %plan.destination.path.display(),
        remote = plan.source.host.as_deref().or(plan.destination.host.as_deref()),
        "starting synchronization"
    );
    let summary = dispatcher
        .executor
        .execute(
            ctx.cancel_token(),
            &spec,
            RsyncRecognizer::default(),
            ctx.progress_sink(),
        )
        .await
        .map_err(|err| transfer_error("sync", err))?;

    ctx.set_total_bytes(summary.total_bytes);
    ctx.report_progress(100, summary.total_bytes);
    Ok(TransferOutcome::Completed)
}

/// Directories are synchronized by content so the destination names the copy.
async fn contents_of(source: PathBuf) -> PathBuf {
    match tokio::fs::metadata(&source).await {
        Ok(metadata) if metadata.is_dir() => source.join(""),
        _ => source,
    }
}
