//! Error types for addressing, placement and transfer outcomes.

use std::error::Error;
use std::fmt::Write as _;

use thiserror::Error;

/// Failures raised while parsing or resolving a logical path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The raw path is malformed or names an unrecognised backend kind.
    #[error("invalid resource address")]
    InvalidAddress {
        /// Raw path supplied by the caller.
        path: String,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// The qualifier does not name a known node, area, repository or account.
    #[error("unknown resource qualifier")]
    UnknownQualifier {
        /// Backend kind the qualifier was evaluated against.
        kind: &'static str,
        /// Offending qualifier.
        qualifier: String,
    },
}

/// Convenience alias for addressing results.
pub type AddressResult<T> = Result<T, AddressError>;

/// Failures raised by the placement policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// The request must run on a different node than the one serving it.
    #[error("request must run on another node")]
    WrongNode {
        /// Node that must execute the request.
        required: String,
        /// Node currently serving the request.
        current: String,
    },
    /// No strategy moves bytes between the two backend kinds.
    #[error("unsupported transfer route")]
    UnsupportedRoute {
        /// Source backend kind.
        from_kind: &'static str,
        /// Destination backend kind.
        to_kind: &'static str,
    },
    /// The action is not meaningful for the given endpoints.
    #[error("unsupported transfer action")]
    UnsupportedAction {
        /// Requested action.
        action: &'static str,
        /// Source backend kind.
        from_kind: &'static str,
    },
}

impl PlacementError {
    /// Short label used for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::WrongNode { .. } => "wrong_node",
            Self::UnsupportedRoute { .. } => "unsupported_route",
            Self::UnsupportedAction { .. } => "unsupported_action",
        }
    }
}

/// Convenience alias for placement results.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Outcome errors reported by a running transfer strategy.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The task's cancellation signal was observed.
    #[error("transfer canceled")]
    Canceled,
    /// The destination lacks room for the payload.
    #[error("insufficient disk space")]
    InsufficientSpace {
        /// Human-readable byte breakdown.
        detail: String,
    },
    /// The transfer failed for any other reason.
    #[error("transfer failed")]
    Failed {
        /// Operation that failed.
        operation: &'static str,
        /// Explanation the source's own message lacks, e.g. a tool's exit code.
        detail: Option<String>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl TransferError {
    /// Wrap an arbitrary failure with an operation tag.
    pub fn failed(operation: &'static str, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Failed {
            operation,
            detail: None,
            source: source.into(),
        }
    }

    /// Like [`TransferError::failed`], with a trailing explanation.
    pub fn failed_with_detail(
        operation: &'static str,
        detail: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Failed {
            operation,
            detail: Some(detail.into()),
            source: source.into(),
        }
    }

    /// Whether this error represents a user-initiated abort.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Convenience alias for transfer results.
pub type TransferResult<T> = Result<T, TransferError>;

/// Render an error and every `source()` beneath it as one line.
#[must_use]
pub fn render_error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let _ = write!(rendered, ": {cause}");
        current = cause.source();
    }
    if let Some(
        TransferError::InsufficientSpace { detail }
        | TransferError::Failed {
            detail: Some(detail),
            ..
        },
    ) = err.downcast_ref::<TransferError>()
    {
        let _ = write!(rendered, ": {detail}");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn error_chain_includes_every_source() {
        let err = TransferError::failed("rsync", io::Error::other("exit status 23"));
        assert_eq!(render_error_chain(&err), "transfer failed: exit status 23");
        assert!(!err.is_canceled());
        assert!(TransferError::Canceled.is_canceled());
    }

    #[test]
    fn failure_detail_follows_the_chain() {
        let err = TransferError::failed_with_detail(
            "sync",
            "exit code 23: some files vanished",
            io::Error::other("transfer tool failed"),
        );
        assert_eq!(
            render_error_chain(&err),
            "transfer failed: transfer tool failed: exit code 23: some files vanished"
        );
    }

    #[test]
    fn insufficient_space_renders_detail() {
        let err = TransferError::InsufficientSpace {
            detail: "required 2.0G, available 1.0G, reserved 512.0M".to_string(),
        };
        assert_eq!(
            render_error_chain(&err),
            "insufficient disk space: required 2.0G, available 1.0G, reserved 512.0M"
        );
    }

    #[test]
    fn placement_reasons_are_stable() {
        let err = PlacementError::WrongNode {
            required: "nodeB".into(),
            current: "nodeA".into(),
        };
        assert_eq!(err.reason(), "wrong_node");
        assert_eq!(err.to_string(), "request must run on another node");
    }
}
