#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Backend-agnostic transfer domain: resource addressing, node topology,
//! placement decisions and the task/request model shared across the workspace.
//!
//! Layout: `address.rs` (parse + resolve), `topology.rs` (fleet membership),
//! `placement.rs` (which node runs what), `model/` (DTOs), `service/`
//! (collaborator traits), `error.rs` (error taxonomy).

pub mod address;
pub mod error;
pub mod model;
pub mod placement;
pub mod service;
pub mod topology;

pub use address::{
    CloudProvider, DriveArea, RemoteEndpoint, ResolvedRoot, ResourceDescriptor, ResourceKind,
    Resolver,
};
pub use error::{
    AddressError, AddressResult, PlacementError, PlacementResult, TransferError, TransferResult,
    render_error_chain,
};
pub use model::{
    Action, PauseInfo, Progress, TaskSnapshot, TaskState, TransferOutcome, TransferRequest,
    Strategy,
};
pub use placement::{PeerNode, PeerRole, Placement, PlacementContext, decide};
pub use service::{CollaborationLocation, CollaborationService};
pub use topology::{NodeTopology, StaticTopology};
