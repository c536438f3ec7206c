//! Cloud tool strategies.
//!
//! The cloud tool copies whole objects and cannot continue from an offset, so these
//! strategies only support cancellation.

use fleetfs_core::{TransferOutcome, TransferResult};
use fleetfs_fsops::{CloudOp, CloudToolRecognizer, CommandSpec, cloud_args};
use fleetfs_runtime::{TaskContext, TransferJob};
use tracing::debug;

use super::{StrategyDispatcher, ensure_parent, transfer_error};

pub(super) async fn push(
    dispatcher: &StrategyDispatcher,
    job: &TransferJob,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let request = &job.request;
    let op = CloudOp::Upload {
        from: dispatcher.local_path(&request.source, &request.source.path)?,
        to: dispatcher.cloud_path(&request.destination, &request.destination_subpath())?,
        remove_source: request.action.removes_source(),
    };
    run_tool(dispatcher, &op, ctx).await
}

pub(super) async fn pull(
    dispatcher: &StrategyDispatcher,
    job: &TransferJob,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let request = &job.request;
    let to = dispatcher.local_path(&request.destination, &request.destination_subpath())?;
    ensure_parent(&to).await?;
    let op = CloudOp::Download {
        from: dispatcher.cloud_path(&request.source, &request.source.path)?,
        to,
        remove_source: request.action.removes_source(),
    };
    run_tool(dispatcher, &op, ctx).await
}

pub(super) async fn server_side_copy(
    dispatcher: &StrategyDispatcher,
    job: &TransferJob,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let request = &job.request;
    let from = dispatcher.cloud_path(&request.source, &request.source.path)?;
    let to = dispatcher.cloud_path(&request.destination, &request.destination_subpath())?;
    let op = if request.action.removes_source() {
        CloudOp::Move { from, to }
    } else {
        CloudOp::Copy { from, to }
    };
    run_tool(dispatcher, &op, ctx).await
}

async fn run_tool(
    dispatcher: &StrategyDispatcher,
    op: &CloudOp,
    ctx: &TaskContext,
) -> TransferResult<TransferOutcome> {
    let spec = CommandSpec::new(&dispatcher.settings.tools.cloud_tool, cloud_args(op));
    debug!(operation = op.as_str(), "starting cloud tool");
    let summary = dispatcher
        .executor
        .execute(
            ctx.cancel_token(),
            &spec,
            CloudToolRecognizer,
            ctx.progress_sink(),
        )
        .await
        .map_err(|err| transfer_error(op.as_str(), err))?;
    ctx.set_total_bytes(summary.total_bytes);
    ctx.report_progress(100, summary.total_bytes);
    Ok(TransferOutcome::Completed)
}
