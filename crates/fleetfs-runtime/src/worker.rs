//! Pool execution and terminal transitions for a single task.

use std::sync::Arc;

use fleetfs_core::{
    PauseInfo, TaskState, TransferError, TransferOutcome, TransferResult, render_error_chain,
};
use fleetfs_events::Event;
use fleetfs_telemetry::task_span;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::context::TaskContext;
use crate::manager::{Inner, StopReason, TaskEntry};

enum Finish {
    Completed { bytes: u64 },
    Paused { offset: u64 },
    Canceled,
    Failed { reason: String },
}

/// Wait for a pool slot, run the strategy and record the outcome.
pub(crate) async fn run_task(
    inner: Arc<Inner>,
    entry: Arc<TaskEntry>,
    token: CancellationToken,
    resume_from: Option<PauseInfo>,
) {
    let span = task_span(
        &entry.job.id,
        &entry.job.request.owner,
        entry.job.strategy.as_str(),
    );
    async move {
        let permit = tokio::select! {
            biased;
            () = token.cancelled() => None,
            permit = Arc::clone(&inner.slots).acquire_owned() => permit.ok(),
        };
        inner.metrics.add_queue_depth(-1);
        let Some(_permit) = permit else {
            debug!("stopped before a worker slot was free");
            finish(&inner, &entry, Err(TransferError::Canceled));
            return;
        };

        mark_running(&inner, &entry);
        inner.metrics.add_active_tasks(1);
        let ctx = TaskContext::new(
            Arc::clone(&entry),
            token.clone(),
            inner.events.clone(),
            resume_from,
        );
        let result = inner.runner.run(&entry.job, ctx).await;
        inner.metrics.add_active_tasks(-1);
        finish(&inner, &entry, result);
    }
    .instrument(span)
    .await;
}

fn mark_running(inner: &Inner, entry: &TaskEntry) {
    {
        let mut record = entry.lock();
        record.state = TaskState::Running;
        record.touch();
    }
    let strategy = entry.job.strategy.as_str();
    inner.events.publish(Event::TaskStarted {
        task_id: entry.job.id.clone(),
    });
    inner.metrics.inc_task(strategy, TaskState::Running.as_str());
    info!("task started");
}

fn finish(inner: &Inner, entry: &TaskEntry, result: TransferResult<TransferOutcome>) {
    let mut record = entry.lock();
    let stop = record.stop.take();
    record.submitted = false;
    record.cancel = None;
    record.touch();

    let outcome = match result {
        Ok(TransferOutcome::Completed) => {
            record.progress.complete();
            record.pause_info = None;
            record.state = TaskState::Completed;
            Finish::Completed {
                bytes: record.progress.bytes_transferred,
            }
        }
        Ok(TransferOutcome::Paused(info)) => {
            let offset = info.offset;
            record.pause_info = Some(info);
            record.state = TaskState::Paused;
            Finish::Paused { offset }
        }
        Err(err) if err.is_canceled() && stop == Some(StopReason::Pause) => {
            let offset = record.progress.bytes_transferred;
            let location = record
                .pause_info
                .as_ref()
                .and_then(|info| info.location.clone());
            record.pause_info = Some(PauseInfo { offset, location });
            record.state = TaskState::Paused;
            Finish::Paused { offset }
        }
        Err(err) if err.is_canceled() || stop == Some(StopReason::Cancel) => {
            record.state = TaskState::Canceled;
            Finish::Canceled
        }
        Err(err) => {
            let reason = render_error_chain(&err);
            record.failure_reason = Some(reason.clone());
            record.state = TaskState::Failed;
            Finish::Failed { reason }
        }
    };
    drop(record);

    let task_id = entry.job.id.clone();
    let strategy = entry.job.strategy.as_str();
    match outcome {
        Finish::Completed { bytes } => {
            inner.metrics.add_bytes(bytes);
            inner
                .metrics
                .inc_task(strategy, TaskState::Completed.as_str());
            inner.health.mark_recovered();
            inner.events.publish(Event::TaskCompleted { task_id });
            info!(bytes, "task completed");
        }
        Finish::Paused { offset } => {
            inner.metrics.inc_task(strategy, TaskState::Paused.as_str());
            inner.events.publish(Event::TaskPaused { task_id, offset });
            info!(offset, "task paused");
        }
        Finish::Canceled => announce_canceled(inner, entry),
        Finish::Failed { reason } => {
            inner.metrics.inc_task(strategy, TaskState::Failed.as_str());
            inner.health.mark_degraded(&reason);
            warn!(reason = %reason, "task failed");
            inner.events.publish(Event::TaskFailed {
                task_id,
                message: reason,
            });
        }
    }
}

/// Publish the cancellation of a task already recorded as `Canceled`.
pub(crate) fn announce_canceled(inner: &Inner, entry: &TaskEntry) {
    inner
        .metrics
        .inc_task(entry.job.strategy.as_str(), TaskState::Canceled.as_str());
    inner.events.publish(Event::TaskCanceled {
        task_id: entry.job.id.clone(),
    });
    info!(task_id = %entry.job.id, "task canceled");
}
