#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (scratch dirs, topology), scripts.rs (fake transfer tools),
//! process.rs (process-table checks), mocks.rs (in-memory collaboration service).

pub mod fixtures;
pub mod mocks;
pub mod process;
pub mod scripts;
