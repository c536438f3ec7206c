#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Task registry and bounded worker pool for transfer jobs.
//!
//! Layout: `manager.rs` (registry + lifecycle operations), `worker.rs` (pool
//! execution and terminal transitions), `context.rs` (what a running strategy
//! sees), `health.rs` (degradation tracking), `error.rs`.

pub mod context;
pub mod error;
mod health;
pub mod manager;
mod worker;

pub use context::{TaskContext, TransferJob, TransferRunner};
pub use error::{TaskError, TaskResult};
pub use manager::{TaskManager, TaskManagerConfig};
