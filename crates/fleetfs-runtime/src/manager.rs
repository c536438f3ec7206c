//! Task registry and lifecycle operations.
//!
//! # Design
//! - One registry per manager instance, keyed by task id with a per-owner index.
//! - Each entry guards its mutable record with its own mutex; lock order is
//!   registry first, entry second.
//! - Only the worker executing a task moves it out of `Running`. Cancel and pause
//!   set a stop reason and fire the task's token. Tasks without a worker (never
//!   submitted, or paused) are finalised directly.
//! - Every task token is a child of the manager's root token, so shutdown reaches
//!   every running strategy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use fleetfs_core::{
    PauseInfo, Placement, Progress, TaskSnapshot, TaskState, TransferRequest,
};
use fleetfs_events::{Event, EventBus};
use fleetfs_telemetry::Metrics;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::{TransferJob, TransferRunner};
use crate::error::{TaskError, TaskResult};
use crate::health::HealthTracker;
use crate::worker;

/// Default number of transfers executing at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tunables for the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskManagerConfig {
    /// Maximum transfers running simultaneously.
    pub concurrency: usize,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    Cancel,
    Pause,
}

pub(crate) struct TaskRecord {
    pub(crate) state: TaskState,
    pub(crate) progress: Progress,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) failure_reason: Option<String>,
    pub(crate) pause_info: Option<PauseInfo>,
    pub(crate) submitted: bool,
    pub(crate) stop: Option<StopReason>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl TaskRecord {
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

pub(crate) struct TaskEntry {
    pub(crate) job: TransferJob,
    pub(crate) created_at: DateTime<Utc>,
    record: Mutex<TaskRecord>,
}

impl TaskEntry {
    fn new(job: TransferJob) -> Self {
        let now = Utc::now();
        Self {
            job,
            created_at: now,
            record: Mutex::new(TaskRecord {
                state: TaskState::Pending,
                progress: Progress::default(),
                updated_at: now,
                failure_reason: None,
                pause_info: None,
                submitted: false,
                stop: None,
                cancel: None,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TaskRecord> {
        self.record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn owner(&self) -> &str {
        &self.job.request.owner
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        let record = self.lock();
        TaskSnapshot {
            id: self.job.id.clone(),
            strategy: self.job.strategy,
            owner: self.job.request.owner.clone(),
            action: self.job.request.action,
            source: self.job.request.source.clone(),
            destination: self.job.request.destination.clone(),
            state: record.state,
            progress: record.progress,
            created_at: self.created_at,
            updated_at: record.updated_at,
            failure_reason: record.failure_reason.clone(),
            pause_info: record.pause_info.clone(),
        }
    }
}

#[derive(Default)]
struct Registry {
    tasks: HashMap<String, Arc<TaskEntry>>,
    by_owner: HashMap<String, Vec<String>>,
}

impl Registry {
    fn unindex(&mut self, owner: &str, task_id: &str) {
        if let Some(ids) = self.by_owner.get_mut(owner) {
            ids.retain(|id| id != task_id);
            if ids.is_empty() {
                self.by_owner.remove(owner);
            }
        }
    }
}

pub(crate) struct Inner {
    registry: RwLock<Registry>,
    pub(crate) runner: Arc<dyn TransferRunner>,
    pub(crate) slots: Arc<Semaphore>,
    pub(crate) root: CancellationToken,
    pub(crate) tracker: TaskTracker,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
    pub(crate) health: HealthTracker,
    concurrency: usize,
}

/// Process-wide registry and worker pool for transfer tasks.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    /// Build a manager running at most `config.concurrency` transfers at once.
    #[must_use]
    pub fn new(
        config: TaskManagerConfig,
        runner: Arc<dyn TransferRunner>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                runner,
                slots: Arc::new(Semaphore::new(concurrency)),
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
                health: HealthTracker::new(events.clone()),
                events,
                metrics,
                concurrency,
            }),
        }
    }

    /// Worker pool size.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Event bus lifecycle events are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Register a task with a freshly generated id in `Pending` state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::ShuttingDown`] after [`TaskManager::shutdown`].
    pub fn create_task(
        &self,
        placement: &Placement,
        request: TransferRequest,
    ) -> TaskResult<TaskSnapshot> {
        self.create_task_with_id(Uuid::new_v4().to_string(), placement, request)
    }

    /// Register a task under a caller-chosen id in `Pending` state.
    ///
    /// A terminal task with the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::DuplicateTask`] when a non-terminal task already uses `task_id`.
    pub fn create_task_with_id(
        &self,
        task_id: impl Into<String>,
        placement: &Placement,
        request: TransferRequest,
    ) -> TaskResult<TaskSnapshot> {
        if self.inner.root.is_cancelled() {
            return Err(TaskError::ShuttingDown);
        }
        let task_id = task_id.into();
        let owner = request.owner.clone();
        let entry = Arc::new(TaskEntry::new(TransferJob {
            id: task_id.clone(),
            strategy: placement.strategy,
            request,
            peer: placement.peer.clone(),
        }));

        {
            let mut registry = self.write();
            if let Some(existing) = registry.tasks.get(&task_id)
                && !existing.lock().state.is_terminal()
            {
                return Err(TaskError::DuplicateTask { task_id });
            }
            if let Some(previous) = registry.tasks.insert(task_id.clone(), Arc::clone(&entry)) {
                let previous_owner = previous.owner().to_string();
                registry.unindex(&previous_owner, &task_id);
            }
            registry
                .by_owner
                .entry(owner.clone())
                .or_default()
                .push(task_id.clone());
        }

        let strategy = placement.strategy.as_str();
        self.inner.events.publish(Event::TaskCreated {
            task_id: task_id.clone(),
            owner: owner.clone(),
            strategy: strategy.to_string(),
        });
        self.inner.metrics.inc_task(strategy, TaskState::Pending.as_str());
        info!(task_id = %task_id, owner = %owner, strategy, "task created");
        Ok(entry.snapshot())
    }

    /// Submit a pending task to the worker pool; returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] for unknown ids, [`TaskError::DuplicateTask`] when the
    /// task is already submitted and [`TaskError::InvalidState`] for paused or terminal tasks.
    pub fn run(&self, task_id: &str) -> TaskResult<()> {
        let entry = self.entry(task_id).ok_or_else(|| TaskError::NotFound {
            task_id: task_id.to_string(),
        })?;
        let mut record = entry.lock();
        if record.submitted {
            return Err(TaskError::DuplicateTask {
                task_id: task_id.to_string(),
            });
        }
        if record.state != TaskState::Pending {
            return Err(TaskError::InvalidState {
                task_id: task_id.to_string(),
                operation: "run",
                state: record.state.as_str(),
            });
        }
        let token = self.arm(&mut record)?;
        drop(record);
        self.spawn_worker(entry, token, None);
        Ok(())
    }

    /// Query tasks owned by `owner`.
    ///
    /// With a non-empty `task_id` the result holds at most that task; otherwise every task
    /// of the owner matching `status` is returned, oldest first. Other owners' tasks are
    /// never returned.
    #[must_use]
    pub fn get_task(
        &self,
        owner: &str,
        task_id: Option<&str>,
        status: Option<TaskState>,
    ) -> Vec<TaskSnapshot> {
        let registry = self.read();
        if let Some(task_id) = task_id.filter(|id| !id.is_empty()) {
            return registry
                .tasks
                .get(task_id)
                .filter(|entry| entry.owner() == owner)
                .map(|entry| vec![entry.snapshot()])
                .unwrap_or_default();
        }
        let mut snapshots: Vec<TaskSnapshot> = registry
            .by_owner
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|id| registry.tasks.get(id))
            .map(|entry| entry.snapshot())
            .filter(|snapshot| status.is_none_or(|wanted| snapshot.state == wanted))
            .collect();
        drop(registry);
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        snapshots
    }

    /// Signal cancellation for one task, or for every non-terminal task of `owner`
    /// when `all` is set. Returns how many tasks were signalled.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] when `all` is unset and `task_id` is not owned by `owner`.
    pub fn cancel_task(&self, owner: &str, task_id: &str, all: bool) -> TaskResult<usize> {
        let targets: Vec<Arc<TaskEntry>> = if all {
            let registry = self.read();
            registry
                .by_owner
                .get(owner)
                .into_iter()
                .flatten()
                .filter_map(|id| registry.tasks.get(id).cloned())
                .collect()
        } else {
            vec![self.owned_entry(owner, task_id)?]
        };
        let signalled = targets
            .iter()
            .filter(|entry| self.signal_stop(entry, StopReason::Cancel))
            .count();
        debug!(owner, task_id, all, signalled, "cancel requested");
        Ok(signalled)
    }

    /// Ask a running chunked transfer to stop at a resumable checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::PauseUnsupported`] for strategies that cannot checkpoint and
    /// [`TaskError::InvalidState`] unless the task is pending in the pool or running.
    pub fn pause_task(&self, owner: &str, task_id: &str) -> TaskResult<()> {
        let entry = self.owned_entry(owner, task_id)?;
        if !entry.job.strategy.supports_pause() {
            return Err(TaskError::PauseUnsupported {
                task_id: task_id.to_string(),
                strategy: entry.job.strategy.as_str(),
            });
        }
        {
            let record = entry.lock();
            let pausable = record.submitted
                && matches!(record.state, TaskState::Pending | TaskState::Running);
            if !pausable {
                return Err(TaskError::InvalidState {
                    task_id: task_id.to_string(),
                    operation: "pause",
                    state: record.state.as_str(),
                });
            }
        }
        self.signal_stop(&entry, StopReason::Pause);
        debug!(owner, task_id, "pause requested");
        Ok(())
    }

    /// Resubmit a paused task, continuing from its checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidState`] unless the task is paused.
    pub fn resume_task(&self, owner: &str, task_id: &str) -> TaskResult<()> {
        let entry = self.owned_entry(owner, task_id)?;
        let mut record = entry.lock();
        if record.state != TaskState::Paused {
            return Err(TaskError::InvalidState {
                task_id: task_id.to_string(),
                operation: "resume",
                state: record.state.as_str(),
            });
        }
        let token = self.arm(&mut record)?;
        record.state = TaskState::Pending;
        record.touch();
        let resume_from = record.pause_info.clone();
        drop(record);
        info!(
            task_id,
            offset = resume_from.as_ref().map_or(0, |info| info.offset),
            "task resumed"
        );
        self.spawn_worker(entry, token, resume_from);
        Ok(())
    }

    /// Drop terminal tasks last updated before `now - older_than`. Returns how many were removed.
    pub fn prune_terminal(&self, older_than: chrono::Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut registry = self.write();
        let expired: Vec<(String, String)> = registry
            .tasks
            .values()
            .filter(|entry| {
                let record = entry.lock();
                record.state.is_terminal() && record.updated_at < cutoff
            })
            .map(|entry| (entry.job.id.clone(), entry.owner().to_string()))
            .collect();
        for (task_id, owner) in &expired {
            registry.tasks.remove(task_id);
            registry.unindex(owner, task_id);
        }
        drop(registry);
        if !expired.is_empty() {
            debug!(removed = expired.len(), "pruned terminal tasks");
        }
        expired.len()
    }

    /// Cancel every task, refuse new work and wait for in-flight workers to finish.
    pub async fn shutdown(&self) {
        self.inner.root.cancel();
        let idle: Vec<Arc<TaskEntry>> = self.read().tasks.values().cloned().collect();
        for entry in &idle {
            self.signal_stop(entry, StopReason::Cancel);
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("task manager stopped");
    }

    fn arm(&self, record: &mut TaskRecord) -> TaskResult<CancellationToken> {
        if self.inner.root.is_cancelled() {
            return Err(TaskError::ShuttingDown);
        }
        let token = self.inner.root.child_token();
        record.submitted = true;
        record.stop = None;
        record.cancel = Some(token.clone());
        Ok(token)
    }

    fn spawn_worker(
        &self,
        entry: Arc<TaskEntry>,
        token: CancellationToken,
        resume_from: Option<PauseInfo>,
    ) {
        self.inner.metrics.add_queue_depth(1);
        self.inner.tracker.spawn(worker::run_task(
            Arc::clone(&self.inner),
            entry,
            token,
            resume_from,
        ));
    }

    /// Signal a stop; returns whether the task was still live.
    fn signal_stop(&self, entry: &Arc<TaskEntry>, reason: StopReason) -> bool {
        let mut record = entry.lock();
        if record.state.is_terminal() {
            return false;
        }
        if record.submitted {
            if record.stop != Some(StopReason::Cancel) {
                record.stop = Some(reason);
            }
            if let Some(token) = &record.cancel {
                token.cancel();
            }
            return true;
        }
        if reason == StopReason::Pause {
            return false;
        }
        record.state = TaskState::Canceled;
        record.touch();
        drop(record);
        worker::announce_canceled(&self.inner, entry);
        true
    }

    fn entry(&self, task_id: &str) -> Option<Arc<TaskEntry>> {
        self.read().tasks.get(task_id).cloned()
    }

    fn owned_entry(&self, owner: &str, task_id: &str) -> TaskResult<Arc<TaskEntry>> {
        self.entry(task_id)
            .filter(|entry| entry.owner() == owner)
            .ok_or_else(|| TaskError::NotFound {
                task_id: task_id.to_string(),
            })
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
