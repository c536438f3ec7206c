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

//! Telemetry primitives shared across the fleetfs workspace.
//!
//! This crate centralises logging, metrics, and tracing span helpers so the
//! task runtime and the node service share one observability story.
//!
//! Layout: `init.rs` (subscriber setup), `metrics.rs` (Prometheus registry),
//! `context.rs` (application and task spans), `error.rs` (error types).

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, task_span};
pub use error::{TelemetryError, TelemetryResult};
pub use init::{LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_str};
pub use metrics::{Metrics, MetricsSnapshot};
