//! Traits implemented by external collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// File inside a collaboration repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollaborationLocation {
    /// Repository identifier.
    pub repo_id: String,
    /// Path inside the repository.
    pub path: String,
}

impl CollaborationLocation {
    /// Build a location.
    #[must_use]
    pub fn new(repo_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            path: path.into(),
        }
    }
}

/// High-level operations of the document-collaboration service.
///
/// Directory listing and permission semantics stay with the service; only
/// byte movement is exposed here.
#[async_trait]
pub trait CollaborationService: Send + Sync {
    /// Size in bytes of an existing file.
    async fn file_size(&self, location: &CollaborationLocation) -> anyhow::Result<u64>;

    /// Read up to `len` bytes starting at `offset`; a short read means end of file.
    async fn fetch_chunk(
        &self,
        location: &CollaborationLocation,
        offset: u64,
        len: usize,
    ) -> anyhow::Result<Vec<u8>>;

    /// Write `bytes` at `offset`; `last` commits the file.
    async fn push_chunk(
        &self,
        location: &CollaborationLocation,
        offset: u64,
        bytes: &[u8],
        last: bool,
    ) -> anyhow::Result<()>;

    /// Copy (or move) a file between repositories without routing bytes through this node.
    async fn server_side_copy(
        &self,
        from: &CollaborationLocation,
        to: &CollaborationLocation,
        is_move: bool,
    ) -> anyhow::Result<()>;
}
