//! # Design
//!
//! - Centralize application-level errors for bootstrap and request planning.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: fleetfs_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: fleetfs_telemetry::TelemetryError,
    },
    /// A logical path could not be parsed or resolved.
    #[error("resource address rejected")]
    Address {
        /// Operation identifier.
        operation: &'static str,
        /// Source addressing error.
        source: fleetfs_core::AddressError,
    },
    /// Placement refused the request or routed it to another node.
    #[error("placement rejected request")]
    Placement {
        /// Operation identifier.
        operation: &'static str,
        /// Source placement error.
        source: fleetfs_core::PlacementError,
    },
    /// Preflight or filesystem inspection failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: fleetfs_fsops::FsOpsError,
    },
    /// Task registry operations failed.
    #[error("task operation failed")]
    Task {
        /// Operation identifier.
        operation: &'static str,
        /// Source task error.
        source: fleetfs_runtime::TaskError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: fleetfs_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: fleetfs_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn address(
        operation: &'static str,
        source: fleetfs_core::AddressError,
    ) -> Self {
        Self::Address { operation, source }
    }

    pub(crate) const fn placement(
        operation: &'static str,
        source: fleetfs_core::PlacementError,
    ) -> Self {
        Self::Placement { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: fleetfs_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) const fn task(operation: &'static str, source: fleetfs_runtime::TaskError) -> Self {
        Self::Task { operation, source }
    }

    /// Whether the request may succeed when retried against another node.
    #[must_use]
    pub const fn is_wrong_node(&self) -> bool {
        matches!(
            self,
            Self::Placement {
                source: fleetfs_core::PlacementError::WrongNode { .. },
                ..
            }
        )
    }
}
