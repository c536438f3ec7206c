//! Transfer requests, strategies and task snapshots shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::ResourceDescriptor;

/// Client-facing transfer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Duplicate the source at the destination.
    Copy,
    /// Copy, then remove the source.
    Move,
    /// Copy from a local filesystem into a remote backend.
    Upload,
}

impl Action {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Upload => "upload",
        }
    }

    /// Whether the source is removed after a successful transfer.
    #[must_use]
    pub const fn removes_source(self) -> bool {
        matches!(self, Self::Move)
    }
}

/// Immutable request handed to the task manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Requesting user.
    pub owner: String,
    /// Requested action.
    pub action: Action,
    /// Where bytes are read from.
    pub source: ResourceDescriptor,
    /// Where bytes are written to.
    pub destination: ResourceDescriptor,
}

impl TransferRequest {
    /// Destination sub-path, naming the source's file when the destination is a bare root.
    #[must_use]
    pub fn destination_subpath(&self) -> String {
        match self.source.file_name() {
            Some(name) if self.destination.path.is_empty() => name.to_string(),
            _ => self.destination.path.clone(),
        }
    }
}

/// Concrete transfer mechanism selected by placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Synchronization tool between two local paths.
    LocalSync,
    /// Synchronization tool between this node and a peer node.
    PullFromNode,
    /// Chunked upload into a collaboration repository.
    PushToCollaboration,
    /// Chunked download from a collaboration repository.
    PullFromCollaboration,
    /// Cloud tool upload.
    PushToCloud,
    /// Cloud tool download.
    PullFromCloud,
    /// Cloud tool copy between two remotes.
    CloudServerSideCopy,
    /// Collaboration service copy between repositories.
    CollaborationServerSideCopy,
}

impl Strategy {
    /// Stable label used in logs, events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalSync => "local_sync",
            Self::PullFromNode => "pull_from_node",
            Self::PushToCollaboration => "push_to_collaboration",
            Self::PullFromCollaboration => "pull_from_collaboration",
            Self::PushToCloud => "push_to_cloud",
            Self::PullFromCloud => "pull_from_cloud",
            Self::CloudServerSideCopy => "cloud_server_side_copy",
            Self::CollaborationServerSideCopy => "collaboration_server_side_copy",
        }
    }

    /// Whether the strategy can checkpoint and resume.
    #[must_use]
    pub const fn supports_pause(self) -> bool {
        matches!(self, Self::PushToCollaboration | Self::PullFromCollaboration)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Registered, waiting for a worker slot.
    Pending,
    /// Executing on a worker.
    Running,
    /// Stopped with a resumption checkpoint.
    Paused,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Aborted by the owner.
    Canceled,
}

impl TaskState {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// Transfer progress; percent and bytes never decrease.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Completion percentage, 0–100.
    pub percent_complete: u8,
    /// Bytes moved so far.
    pub bytes_transferred: u64,
    /// Expected total, 0 when unknown.
    pub total_bytes: u64,
}

impl Progress {
    /// Fold a new observation in, keeping both counters monotonic.
    /// Returns `true` when anything changed.
    pub fn advance(&mut self, percent: u8, bytes_transferred: u64) -> bool {
        let percent = percent.min(100);
        let before = *self;
        self.percent_complete = self.percent_complete.max(percent);
        self.bytes_transferred = self.bytes_transferred.max(bytes_transferred);
        if self.total_bytes < self.bytes_transferred {
            self.total_bytes = self.bytes_transferred;
        }
        before != *self
    }

    /// Mark the transfer complete. Byte counts stay at what the transfer reported.
    pub const fn complete(&mut self) {
        self.percent_complete = 100;
    }
}

/// Resumption checkpoint recorded when a chunked transfer pauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseInfo {
    /// Bytes already committed at the destination.
    pub offset: u64,
    /// Backend-specific resume location, e.g. an upload session.
    pub location: Option<String>,
}

/// Successful strategy outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every byte was transferred.
    Completed,
    /// The transfer stopped at a checkpoint.
    Paused(PauseInfo),
}

/// Point-in-time view of a task, returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub id: String,
    /// Selected strategy.
    pub strategy: Strategy,
    /// Owning user.
    pub owner: String,
    /// Requested action.
    pub action: Action,
    /// Source descriptor.
    pub source: ResourceDescriptor,
    /// Destination descriptor.
    pub destination: ResourceDescriptor,
    /// Lifecycle state.
    pub state: TaskState,
    /// Progress counters.
    pub progress: Progress,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Failure description for failed tasks.
    pub failure_reason: Option<String>,
    /// Checkpoint for paused tasks.
    pub pause_info: Option<PauseInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_never_moves_backwards() {
        let mut progress = Progress::default();
        assert!(progress.advance(40, 400));
        assert!(!progress.advance(20, 100));
        assert_eq!(progress.percent_complete, 40);
        assert_eq!(progress.bytes_transferred, 400);
        assert!(progress.advance(250, 500));
        assert_eq!(progress.percent_complete, 100);

        progress.total_bytes = 1_000;
        progress.complete();
        assert_eq!(progress.percent_complete, 100);
        assert_eq!(progress.bytes_transferred, 500);
        assert_eq!(progress.total_bytes, 1_000);
    }

    #[test]
    fn terminal_states_and_pause_support() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
        assert!(!TaskState::Paused.is_terminal());
        assert!(Strategy::PushToCollaboration.supports_pause());
        assert!(Strategy::PullFromCollaboration.supports_pause());
        assert!(!Strategy::PushToCloud.supports_pause());
        assert!(!Strategy::PullFromCloud.supports_pause());
        assert!(!Strategy::LocalSync.supports_pause());
        assert!(Action::Move.removes_source());
    }

    #[test]
    fn labels_match_serde_names() -> Result<(), serde_json::Error> {
        for strategy in [
            Strategy::LocalSync,
            Strategy::PullFromNode,
            Strategy::CollaborationServerSideCopy,
        ] {
            assert_eq!(
                serde_json::to_value(strategy)?,
                serde_json::Value::String(strategy.as_str().to_string())
            );
        }
        assert_eq!(
            serde_json::to_value(TaskState::Canceled)?,
            serde_json::json!("canceled")
        );
        Ok(())
    }

    #[test]
    fn bare_destination_roots_take_the_source_name() -> crate::AddressResult<()> {
        let topology = crate::StaticTopology::new("nodeA", ["nodeA"]);
        let request = |destination: &str| -> crate::AddressResult<TransferRequest> {
            Ok(TransferRequest {
                owner: "alice".into(),
                action: Action::Copy,
                source: ResourceDescriptor::parse("alice", "/drive/home/docs/report.pdf", &topology)?,
                destination: ResourceDescriptor::parse("alice", destination, &topology)?,
            })
        };
        assert_eq!(request("/cache/nodeA")?.destination_subpath(), "report.pdf");
        assert_eq!(
            request("/cache/nodeA/renamed.pdf")?.destination_subpath(),
            "renamed.pdf"
        );
        Ok(())
    }
}
