//! Error types for task lifecycle operations.

use thiserror::Error;

/// Failures returned by [`TaskManager`](crate::TaskManager) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A non-terminal task with this id is already registered or submitted.
    #[error("task already active")]
    DuplicateTask {
        /// Conflicting task id.
        task_id: String,
    },
    /// No task with this id belongs to the caller.
    #[error("task not found")]
    NotFound {
        /// Requested task id.
        task_id: String,
    },
    /// Pause and resume are limited to chunked remote strategies.
    #[error("task strategy cannot pause")]
    PauseUnsupported {
        /// Task id.
        task_id: String,
        /// Strategy label.
        strategy: &'static str,
    },
    /// The operation does not apply in the task's current state.
    #[error("operation not valid in current task state")]
    InvalidState {
        /// Task id.
        task_id: String,
        /// Operation attempted.
        operation: &'static str,
        /// State the task was in.
        state: &'static str,
    },
    /// The manager is shutting down and accepts no new work.
    #[error("task manager shutting down")]
    ShuttingDown,
}

/// Convenience alias for task lifecycle results.
pub type TaskResult<T> = Result<T, TaskError>;
