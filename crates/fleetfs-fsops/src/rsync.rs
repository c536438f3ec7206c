//! Argument builders for the synchronization tool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One side of a sync: a local path or a path on a remote-shell host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEndpoint {
    /// Remote-shell host, `None` for local paths.
    pub host: Option<String>,
    /// Absolute path on that host.
    pub path: PathBuf,
}

impl SyncEndpoint {
    /// Endpoint on this node.
    #[must_use]
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            host: None,
            path: path.into(),
        }
    }

    /// Endpoint on `host`.
    #[must_use]
    pub fn remote(host: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            host: Some(host.into()),
            path: path.into(),
        }
    }

    fn to_arg(&self) -> OsString {
        match &self.host {
            None => self.path.clone().into_os_string(),
            Some(host) => {
                let mut arg = OsString::from(format!("{host}:"));
                arg.push(self.path.as_os_str());
                arg
            }
        }
    }
}

/// Description of one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Where bytes are read from.
    pub source: SyncEndpoint,
    /// Where bytes are written to.
    pub destination: SyncEndpoint,
    /// Remove source files once transferred.
    pub remove_source: bool,
}

/// Remote shell used for node-to-node transfers.
pub const REMOTE_SHELL: &str = "ssh -o BatchMode=yes -o StrictHostKeyChecking=accept-new";

/// Build the tool arguments for `plan`.
///
/// The flags request `progress2` output and the closing `sent/received/total size`
/// summary the rsync recognizer depends on.
#[must_use]
pub fn sync_args(plan: &SyncPlan) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-a", "-v", "--partial", "--info=progress2"]
        .into_iter()
        .map(OsString::from)
        .collect();
    if plan.remove_source {
        args.push("--remove-source-files".into());
    }
    if plan.source.host.is_some() || plan.destination.host.is_some() {
        args.push("-e".into());
        args.push(REMOTE_SHELL.into());
    }
    if plan.destination.host.is_some() {
        args.push("--mkpath".into());
    }
    args.push(plan.source.to_arg());
    args.push(plan.destination.to_arg());
    args
}

/// Directory that must exist locally before syncing into `destination`.
#[must_use]
pub fn destination_parent(destination: &Path) -> Option<&Path> {
    destination.parent().filter(|parent| !parent.as_os_str().is_empty())
}
