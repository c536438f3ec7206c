//! # Design
//!
//! - Provide structured, constant-message errors for the executor and preflight.
//! - Capture operation context (program, paths, fields) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for executor and preflight operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while running transfer tools or inspecting filesystems.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// The transfer tool could not be started.
    #[error("fsops spawn failure")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// IO failures while interacting with the filesystem or child process.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Nix syscall failures.
    #[error("fsops nix failure")]
    Nix {
        /// Operation that triggered the nix failure.
        operation: &'static str,
        /// Path involved in the nix failure.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Walkdir traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// The transfer tool exited unsuccessfully.
    #[error("transfer tool failed")]
    TransferFailed {
        /// Program that failed.
        program: PathBuf,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Last non-benign output lines.
        detail: String,
    },
    /// The cancellation token fired before the tool finished.
    #[error("transfer canceled")]
    Canceled,
    /// Destination lacks room for the payload.
    #[error("insufficient disk space")]
    InsufficientSpace {
        /// Filesystem path that was checked.
        path: PathBuf,
        /// Bytes the transfer needs.
        required: u64,
        /// Bytes available on the filesystem.
        available: u64,
        /// Bytes held back as reserve.
        reserved: u64,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn nix(operation: &'static str, path: impl Into<PathBuf>, source: nix::Error) -> Self {
        Self::Nix {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Human-readable explanation for variants whose message is not enough on its own.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::TransferFailed { code, detail, .. } => Some(match code {
                Some(code) if detail.is_empty() => format!("exit code {code}"),
                Some(code) => format!("exit code {code}: {detail}"),
                None if detail.is_empty() => "terminated by signal".to_string(),
                None => format!("terminated by signal: {detail}"),
            }),
            Self::InsufficientSpace {
                required,
                available,
                reserved,
                ..
            } => Some(crate::space::describe_shortfall(*required, *available, *reserved)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use walkdir::WalkDir;

    #[test]
    fn fsops_error_helpers_build_variants() -> Result<(), Box<dyn Error>> {
        let io_err = FsOpsError::io("read", "path", io::Error::other("io"));
        assert!(matches!(io_err, FsOpsError::Io { .. }));
        assert!(io_err.source().is_some());

        let nix_err = FsOpsError::nix("statvfs", "/missing", nix::Error::ENOENT);
        assert!(nix_err.source().is_some());

        let temp = tempfile::tempdir()?;
        let missing = temp.path().join("missing");
        let walkdir_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let walk_err = FsOpsError::walkdir("walk", &missing, walkdir_error);
        assert!(matches!(walk_err, FsOpsError::Walkdir { .. }));
        assert!(walk_err.source().is_some());
        Ok(())
    }

    #[test]
    fn details_explain_failures() {
        let failed = FsOpsError::TransferFailed {
            program: "rsync".into(),
            code: Some(23),
            detail: "rsync error: some files could not be transferred".into(),
        };
        assert_eq!(
            failed.detail().as_deref(),
            Some("exit code 23: rsync error: some files could not be transferred")
        );
        let killed = FsOpsError::TransferFailed {
            program: "rsync".into(),
            code: None,
            detail: String::new(),
        };
        assert_eq!(killed.detail().as_deref(), Some("terminated by signal"));
        assert_eq!(FsOpsError::Canceled.detail(), None);
    }
}
