//! Event payload types carried across the node service.

use chrono::{DateTime, Utc};

/// Identifier assigned to each event emitted by the service.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A transfer task was registered in `pending` state.
    TaskCreated {
        /// Identifier of the task.
        task_id: String,
        /// Owner that requested the transfer.
        owner: String,
        /// Strategy label selected by placement.
        strategy: String,
    },
    /// A worker dequeued the task and started the strategy.
    TaskStarted {
        /// Identifier of the task.
        task_id: String,
    },
    /// Progress reported by a running strategy.
    TaskProgress {
        /// Identifier of the task.
        task_id: String,
        /// Percentage complete (0-100).
        percent: u8,
        /// Bytes moved so far.
        bytes_transferred: u64,
    },
    /// The task stopped at a resumable checkpoint.
    TaskPaused {
        /// Identifier of the task.
        task_id: String,
        /// Byte offset recorded for resumption.
        offset: u64,
    },
    /// The task finished successfully.
    TaskCompleted {
        /// Identifier of the task.
        task_id: String,
    },
    /// The task failed; the message mirrors the recorded failure reason.
    TaskFailed {
        /// Identifier of the task.
        task_id: String,
        /// Failure detail.
        message: String,
    },
    /// The task was canceled by its owner.
    TaskCanceled {
        /// Identifier of the task.
        task_id: String,
    },
    /// Component health transitioned.
    HealthChanged {
        /// Components currently considered degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator for log and stream consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskProgress { .. } => "task_progress",
            Self::TaskPaused { .. } => "task_paused",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskCanceled { .. } => "task_canceled",
            Self::HealthChanged { .. } => "health_changed",
        }
    }

    /// Task identifier carried by the event, if any.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::TaskStarted { task_id }
            | Self::TaskProgress { task_id, .. }
            | Self::TaskPaused { task_id, .. }
            | Self::TaskCompleted { task_id }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskCanceled { task_id } => Some(task_id),
            Self::HealthChanged { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_maps_task_variants() {
        let id = "t-1".to_string();
        assert_event_kind(
            &Event::TaskCreated {
                task_id: id.clone(),
                owner: "alice".into(),
                strategy: "local_sync".into(),
            },
            "task_created",
        );
        assert_event_kind(&Event::TaskStarted { task_id: id.clone() }, "task_started");
        assert_event_kind(
            &Event::TaskProgress {
                task_id: id.clone(),
                percent: 10,
                bytes_transferred: 1,
            },
            "task_progress",
        );
        assert_event_kind(
            &Event::TaskPaused {
                task_id: id.clone(),
                offset: 4,
            },
            "task_paused",
        );
        assert_event_kind(&Event::TaskCompleted { task_id: id.clone() }, "task_completed");
        assert_event_kind(
            &Event::TaskFailed {
                task_id: id.clone(),
                message: "boom".into(),
            },
            "task_failed",
        );
        assert_event_kind(&Event::TaskCanceled { task_id: id }, "task_canceled");
        assert_event_kind(&Event::HealthChanged { degraded: vec![] }, "health_changed");
    }

    #[test]
    fn task_id_is_exposed_for_task_events_only() {
        let event = Event::TaskCompleted {
            task_id: "abc".into(),
        };
        assert_eq!(event.task_id(), Some("abc"));
        assert_eq!(Event::HealthChanged { degraded: vec![] }.task_id(), None);
    }

    #[test]
    fn events_serialize_with_snake_case_tag() {
        let json = serde_json::to_value(Event::TaskCanceled {
            task_id: "abc".into(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "task_canceled");
        assert_eq!(json["task_id"], "abc");
    }

    fn assert_event_kind(event: &Event, expected: &str) {
        assert_eq!(event.kind(), expected);
    }
}
