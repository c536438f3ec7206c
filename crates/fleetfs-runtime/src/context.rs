//! What a running strategy sees: the job, its cancellation token and a progress sink.

use std::sync::Arc;

use async_trait::async_trait;
use fleetfs_core::{
    PauseInfo, PeerNode, Strategy, TransferOutcome, TransferRequest, TransferResult,
};
use fleetfs_events::{Event, EventBus};
use tokio_util::sync::CancellationToken;

use crate::manager::{StopReason, TaskEntry};

/// Immutable description of the work a task performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Task identifier.
    pub id: String,
    /// Strategy selected by placement.
    pub strategy: Strategy,
    /// Request the task was created from.
    pub request: TransferRequest,
    /// Remote node for node-to-node transfers.
    pub peer: Option<PeerNode>,
}

/// Executes a job's strategy.
///
/// Implementations must observe [`TaskContext::cancel_token`] and return promptly
/// once it fires: [`TransferOutcome::Paused`] when [`TaskContext::pause_requested`]
/// is set and the strategy can checkpoint, otherwise
/// [`TransferError::Canceled`](fleetfs_core::TransferError::Canceled).
#[async_trait]
pub trait TransferRunner: Send + Sync {
    /// Run `job` to completion, pause or failure.
    async fn run(&self, job: &TransferJob, ctx: TaskContext) -> TransferResult<TransferOutcome>;
}

/// Handle given to a strategy for one execution attempt.
#[derive(Clone)]
pub struct TaskContext {
    entry: Arc<TaskEntry>,
    cancel: CancellationToken,
    events: EventBus,
    resume_from: Option<PauseInfo>,
}

impl TaskContext {
    pub(crate) const fn new(
        entry: Arc<TaskEntry>,
        cancel: CancellationToken,
        events: EventBus,
        resume_from: Option<PauseInfo>,
    ) -> Self {
        Self {
            entry,
            cancel,
            events,
            resume_from,
        }
    }

    /// Task identifier.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.entry.job.id
    }

    /// Token that fires on cancel, pause or shutdown.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the strategy should stop now.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the stop signal is a pause rather than a cancel.
    #[must_use]
    pub fn pause_requested(&self) -> bool {
        self.cancel.is_cancelled() && self.entry.lock().stop == Some(StopReason::Pause)
    }

    /// Checkpoint to continue from when this attempt is a resume.
    #[must_use]
    pub const fn resume_from(&self) -> Option<&PauseInfo> {
        self.resume_from.as_ref()
    }

    /// Record the expected payload size.
    pub fn set_total_bytes(&self, total_bytes: u64) {
        let mut record = self.entry.lock();
        record.progress.total_bytes = record.progress.total_bytes.max(total_bytes);
    }

    /// Record progress; regressions are ignored.
    pub fn report_progress(&self, percent: u8, bytes_transferred: u64) {
        let mut record = self.entry.lock();
        if !record.progress.advance(percent, bytes_transferred) {
            return;
        }
        let progress = record.progress;
        drop(record);
        self.events.publish(Event::TaskProgress {
            task_id: self.entry.job.id.clone(),
            percent: progress.percent_complete,
            bytes_transferred: progress.bytes_transferred,
        });
    }

    /// Owned callback suitable for the transfer executor.
    #[must_use]
    pub fn progress_sink(&self) -> impl FnMut(u8, u64) + Send + 'static {
        let ctx = self.clone();
        move |percent, bytes| ctx.report_progress(percent, bytes)
    }
}
