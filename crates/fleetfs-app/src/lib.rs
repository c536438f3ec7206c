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

//! Fleetfs node service wiring.
//!
//! Layout: `bootstrap.rs` (environment + service wiring), `orchestrator.rs`
//! (request planning, placement and preflight), `strategies/` (strategy dispatch
//! and per-backend adapters), `error.rs`.

/// Application bootstrap and service wiring.
pub mod bootstrap;
/// Application-level errors.
pub mod error;
/// Request planning and task submission.
pub mod orchestrator;
/// Strategy dispatch for the worker pool.
pub mod strategies;

pub use bootstrap::{NodeServices, UnconfiguredCollaboration, run_app};
pub use error::{AppError, AppResult};
pub use orchestrator::TransferOrchestrator;
pub use strategies::StrategyDispatcher;
