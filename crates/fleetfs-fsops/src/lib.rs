#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Transfer tool execution and filesystem preflight.
//!
//! Layout: `executor.rs` (process-group runner), `progress.rs` (output
//! recognizers), `rsync.rs` / `cloud.rs` (argument builders), `space.rs`
//! (disk space preflight), `error.rs` (error taxonomy).

pub mod cloud;
pub mod error;
pub mod executor;
pub mod progress;
pub mod rsync;
pub mod space;

pub use cloud::{CloudOp, CloudPath, cloud_args};
pub use error::{FsOpsError, FsOpsResult};
pub use executor::{CommandSpec, ExecutionSummary, TransferExecutor};
pub use progress::{CloudToolRecognizer, OutputRecognizer, ProgressSignal, RsyncRecognizer};
pub use rsync::{SyncEndpoint, SyncPlan, destination_parent, sync_args};
pub use space::{SpaceCheck, SpacePreflight, format_bytes, measure_tree, tree_size};
