//! Disk space preflight.
//!
//! # Design
//! - Read filesystem statistics for `/` and for the filesystem hosting the target.
//! - Overlay and virtualised mounts sometimes report absurd free space; above
//!   [`IMPLAUSIBLE_AVAILABLE_BYTES`] the root filesystem figure is used instead.
//! - An insufficient result is a value, not an error.

use std::io;
use std::path::{Path, PathBuf};

use nix::sys::statvfs::statvfs;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Available-space figures above this (1 PiB) are treated as misreported.
pub const IMPLAUSIBLE_AVAILABLE_BYTES: u64 = 1 << 50;

/// Outcome of a space check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpaceCheck {
    /// Whether `required <= available - reserved`.
    pub ok: bool,
    /// Bytes the transfer needs.
    pub required: u64,
    /// Bytes available to unprivileged users.
    pub available: u64,
    /// Bytes held back as reserve.
    pub reserved: u64,
}

impl SpaceCheck {
    fn evaluate(required: u64, available: u64, reserved: u64) -> Self {
        Self {
            ok: required <= available.saturating_sub(reserved),
            required,
            available,
            reserved,
        }
    }

    /// Human-readable byte breakdown.
    #[must_use]
    pub fn describe(&self) -> String {
        describe_shortfall(self.required, self.available, self.reserved)
    }

    /// Convert a failed check into [`FsOpsError::InsufficientSpace`].
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::InsufficientSpace`] when the check did not pass.
    pub fn ensure(self, path: &Path) -> FsOpsResult<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(FsOpsError::InsufficientSpace {
                path: path.to_path_buf(),
                required: self.required,
                available: self.available,
                reserved: self.reserved,
            })
        }
    }
}

pub(crate) fn describe_shortfall(required: u64, available: u64, reserved: u64) -> String {
    format!(
        "required {}, available {}, reserved {}",
        format_bytes(required),
        format_bytes(available),
        format_bytes(reserved)
    )
}

/// Checks free space against a configured reserve.
#[derive(Debug, Clone)]
pub struct SpacePreflight {
    reserved: u64,
    root: PathBuf,
}

impl SpacePreflight {
    /// Build a preflight that keeps `reserved` bytes free.
    #[must_use]
    pub fn new(reserved: u64) -> Self {
        Self {
            reserved,
            root: PathBuf::from("/"),
        }
    }

    /// Override the filesystem used as the fallback figure.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Reserve applied to every check.
    #[must_use]
    pub const fn reserved(&self) -> u64 {
        self.reserved
    }

    /// Check whether `required` bytes fit on the filesystem hosting `target`.
    ///
    /// `target` need not exist yet; its nearest existing ancestor is inspected.
    ///
    /// # Errors
    ///
    /// Returns an error when filesystem statistics cannot be read.
    pub fn check_space(&self, target: &Path, required: u64) -> FsOpsResult<SpaceCheck> {
        let root_available = available_bytes(&self.root)?;
        let inspected = target
            .ancestors()
            .find(|candidate| candidate.exists())
            .unwrap_or(self.root.as_path());
        let reported = available_bytes(inspected)?;
        let available = plausible_available(reported, root_available);
        if available != reported {
            warn!(
                path = %inspected.display(),
                reported,
                fallback = root_available,
                "implausible free space reported; using root filesystem figure"
            );
        }
        let check = SpaceCheck::evaluate(required, available, self.reserved);
        debug!(
            path = %inspected.display(),
            required,
            available,
            reserved = self.reserved,
            ok = check.ok,
            "space preflight"
        );
        Ok(check)
    }
}

/// `target` unless it exceeds [`IMPLAUSIBLE_AVAILABLE_BYTES`], then `root`.
const fn plausible_available(target: u64, root: u64) -> u64 {
    if target > IMPLAUSIBLE_AVAILABLE_BYTES {
        root
    } else {
        target
    }
}

#[allow(clippy::useless_conversion)]
fn available_bytes(path: &Path) -> FsOpsResult<u64> {
    let stats = statvfs(path).map_err(|source| FsOpsError::nix("statvfs", path, source))?;
    Ok(u64::from(stats.blocks_available()).saturating_mul(u64::from(stats.fragment_size())))
}

/// Total size in bytes of a file or directory tree; symlinks are not followed.
///
/// # Errors
///
/// Returns an error when the tree cannot be walked.
pub fn tree_size(path: &Path) -> FsOpsResult<u64> {
    let mut total = 0_u64;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|source| FsOpsError::walkdir("tree_size.walk", path, source))?;
        if entry.file_type().is_file() {
            let metadata = entry
                .metadata()
                .map_err(|source| FsOpsError::walkdir("tree_size.metadata", entry.path(), source))?;
            total = total.saturating_add(metadata.len());
        }
    }
    Ok(total)
}

/// [`tree_size`] on the blocking pool, for callers running on the async runtime.
///
/// # Errors
///
/// Returns an error when the tree cannot be walked or the blocking task is lost.
pub async fn measure_tree(path: PathBuf) -> FsOpsResult<u64> {
    let walked = path.clone();
    tokio::task::spawn_blocking(move || tree_size(&walked))
        .await
        .map_err(|err| FsOpsError::io("tree_size.join", path, io::Error::other(err)))?
}

/// Render a byte count with K/M/G/T units (base 1024).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for &next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1}{unit}")
}
