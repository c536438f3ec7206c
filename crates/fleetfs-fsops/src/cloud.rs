//! Argument builders for the generic cloud transfer tool.
//!
//! Provider credentials live in the tool's own configuration under remote names
//! of the form `<provider>_<owner>_<account>`; only sub-operations are built here.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// Path on a configured remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudPath {
    /// Remote name.
    pub remote: String,
    /// Path within the remote.
    pub path: String,
}

impl CloudPath {
    /// Build a remote path.
    #[must_use]
    pub fn new(remote: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for CloudPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote, self.path)
    }
}

/// Cloud tool sub-operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudOp {
    /// List a remote directory as JSON.
    List {
        /// Directory to list.
        target: CloudPath,
    },
    /// Copy between two remotes.
    Copy {
        /// Source object.
        from: CloudPath,
        /// Destination object.
        to: CloudPath,
    },
    /// Move between two remotes.
    Move {
        /// Source object.
        from: CloudPath,
        /// Destination object.
        to: CloudPath,
    },
    /// Remote to local filesystem.
    Download {
        /// Source object.
        from: CloudPath,
        /// Local destination file.
        to: PathBuf,
        /// Remove the remote object afterwards.
        remove_source: bool,
    },
    /// Local filesystem to remote.
    Upload {
        /// Local source file.
        from: PathBuf,
        /// Destination object.
        to: CloudPath,
        /// Remove the local file afterwards.
        remove_source: bool,
    },
}

impl CloudOp {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Copy { .. } => "copy",
            Self::Move { .. } => "move",
            Self::Download { .. } => "download",
            Self::Upload { .. } => "upload",
        }
    }
}

const STATS_FLAGS: [&str; 4] = ["--stats-one-line", "--stats", "1s", "-v"];

/// Build the tool arguments for `op`.
#[must_use]
pub fn cloud_args(op: &CloudOp) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let verb = |remove: bool| if remove { "moveto" } else { "copyto" };
    match op {
        CloudOp::List { target } => {
            args.push("lsjson".into());
            args.push(target.to_string().into());
            return args;
        }
        CloudOp::Copy { from, to } | CloudOp::Move { from, to } => {
            args.push(verb(matches!(op, CloudOp::Move { .. })).into());
            args.push(from.to_string().into());
            args.push(to.to_string().into());
        }
        CloudOp::Download {
            from,
            to,
            remove_source,
        } => {
            args.push(verb(*remove_source).into());
            args.push(from.to_string().into());
            args.push(to.clone().into_os_string());
        }
        CloudOp::Upload {
            from,
            to,
            remove_source,
        } => {
            args.push(verb(*remove_source).into());
            args.push(from.clone().into_os_string());
            args.push(to.to_string().into());
        }
    }
    args.extend(STATS_FLAGS.into_iter().map(OsString::from));
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(op: &CloudOp) -> Vec<String> {
        cloud_args(op)
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn list_has_no_stats_flags() {
        let op = CloudOp::List {
            target: CloudPath::new("google_alice_work", "reports"),
        };
        assert_eq!(strings(&op), vec!["lsjson", "google_alice_work:reports"]);
        assert_eq!(op.as_str(), "list");
    }

    #[test]
    fn transfers_pick_copy_or_move_verbs() {
        let server_side = CloudOp::Move {
            from: CloudPath::new("awss3_alice_b", "a.txt"),
            to: CloudPath::new("google_alice_w", "a.txt"),
        };
        assert_eq!(
            strings(&server_side)[..3],
            ["moveto", "awss3_alice_b:a.txt", "google_alice_w:a.txt"]
        );

        let upload = CloudOp::Upload {
            from: PathBuf::from("/data/alice/Home/a.txt"),
            to: CloudPath::new("dropbox_alice_p", "a.txt"),
            remove_source: false,
        };
        let args = strings(&upload);
        assert_eq!(args[0], "copyto");
        assert_eq!(args[1], "/data/alice/Home/a.txt");
        assert!(args.contains(&"--stats-one-line".to_string()));

        let download = CloudOp::Download {
            from: CloudPath::new("tencent_alice_c", "a.txt"),
            to: PathBuf::from("/data/cache/alice/a.txt"),
            remove_source: true,
        };
        assert_eq!(strings(&download)[0], "moveto");
    }
}
