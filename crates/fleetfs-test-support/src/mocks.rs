//! In-memory stand-ins for external collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use fleetfs_core::{CollaborationLocation, CollaborationService};

type Key = (String, String);

#[derive(Default)]
struct Store {
    files: HashMap<Key, Vec<u8>>,
    staged: HashMap<Key, Vec<u8>>,
    pushed_chunks: usize,
}

/// Collaboration service keeping repositories in memory.
///
/// Uploads are staged until the final chunk arrives; an optional delay per chunk
/// lets tests pause or cancel mid-transfer.
#[derive(Clone, Default)]
pub struct InMemoryCollaboration {
    store: Arc<Mutex<Store>>,
    chunk_delay: Option<Duration>,
    served_limit: Option<usize>,
}

impl InMemoryCollaboration {
    /// Empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before serving every chunk.
    #[must_use]
    pub const fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Serve at most the first `limit` bytes of any file, while `file_size` still
    /// reports the full length.
    #[must_use]
    pub const fn with_served_limit(mut self, limit: usize) -> Self {
        self.served_limit = Some(limit);
        self
    }

    /// Seed a committed file.
    pub fn insert(&self, location: &CollaborationLocation, bytes: Vec<u8>) {
        self.lock().files.insert(key(location), bytes);
    }

    /// Committed contents of a file.
    #[must_use]
    pub fn contents(&self, location: &CollaborationLocation) -> Option<Vec<u8>> {
        self.lock().files.get(&key(location)).cloned()
    }

    /// Bytes staged for an in-progress upload.
    #[must_use]
    pub fn staged_len(&self, location: &CollaborationLocation) -> usize {
        self.lock().staged.get(&key(location)).map_or(0, Vec::len)
    }

    /// Number of chunks accepted so far.
    #[must_use]
    pub fn pushed_chunks(&self) -> usize {
        self.lock().pushed_chunks
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(delay) = self.chunk_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn key(location: &CollaborationLocation) -> Key {
    (location.repo_id.clone(), location.path.clone())
}

#[async_trait]
impl CollaborationService for InMemoryCollaboration {
    async fn file_size(&self, location: &CollaborationLocation) -> anyhow::Result<u64> {
        let store = self.lock();
        let bytes = store
            .files
            .get(&key(location))
            .ok_or_else(|| anyhow!("file not found: {}/{}", location.repo_id, location.path))?;
        Ok(bytes.len() as u64)
    }

    async fn fetch_chunk(
        &self,
        location: &CollaborationLocation,
        offset: u64,
        len: usize,
    ) -> anyhow::Result<Vec<u8>> {
        self.delay().await;
        let store = self.lock();
        let bytes = store
            .files
            .get(&key(location))
            .ok_or_else(|| anyhow!("file not found: {}/{}", location.repo_id, location.path))?;
        let served = self.served_limit.map_or(bytes.len(), |limit| limit.min(bytes.len()));
        let start = usize::try_from(offset)?.min(served);
        let end = start.saturating_add(len).min(served);
        Ok(bytes[start..end].to_vec())
    }

    async fn push_chunk(
        &self,
        location: &CollaborationLocation,
        offset: u64,
        bytes: &[u8],
        last: bool,
    ) -> anyhow::Result<()> {
        self.delay().await;
        let mut store = self.lock();
        let id = key(location);
        let staged = store.staged.entry(id.clone()).or_default();
        if staged.len() as u64 != offset {
            bail!("offset mismatch: staged {} bytes, got offset {offset}", staged.len());
        }
        staged.extend_from_slice(bytes);
        store.pushed_chunks += 1;
        if last {
            let committed = store.staged.remove(&id).unwrap_or_default();
            store.files.insert(id, committed);
        }
        Ok(())
    }

    async fn server_side_copy(
        &self,
        from: &CollaborationLocation,
        to: &CollaborationLocation,
        is_move: bool,
    ) -> anyhow::Result<()> {
        let mut store = self.lock();
        let source = key(from);
        let bytes = if is_move {
            store.files.remove(&source)
        } else {
            store.files.get(&source).cloned()
        }
        .ok_or_else(|| anyhow!("file not found: {}/{}", from.repo_id, from.path))?;
        store.files.insert(key(to), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunks_commit_on_last_push() -> anyhow::Result<()> {
        let service = InMemoryCollaboration::new();
        let location = CollaborationLocation::new("repo", "a.txt");
        service.push_chunk(&location, 0, b"hello ", false).await?;
        assert_eq!(service.staged_len(&location), 6);
        assert!(service.contents(&location).is_none());
        assert!(service.push_chunk(&location, 3, b"x", false).await.is_err());
        service.push_chunk(&location, 6, b"world", true).await?;
        assert_eq!(service.contents(&location), Some(b"hello world".to_vec()));
        assert_eq!(service.file_size(&location).await?, 11);
        assert_eq!(service.fetch_chunk(&location, 6, 100).await?, b"world".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn served_limit_truncates_reads_only() -> anyhow::Result<()> {
        let service = InMemoryCollaboration::new().with_served_limit(4);
        let location = CollaborationLocation::new("repo", "a.txt");
        service.insert(&location, b"abcdefgh".to_vec());
        assert_eq!(service.file_size(&location).await?, 8);
        assert_eq!(service.fetch_chunk(&location, 0, 100).await?, b"abcd".to_vec());
        assert!(service.fetch_chunk(&location, 4, 100).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn server_side_move_removes_source() -> anyhow::Result<()> {
        let service = InMemoryCollaboration::new();
        let from = CollaborationLocation::new("r1", "a");
        let to = CollaborationLocation::new("r2", "a");
        service.insert(&from, b"data".to_vec());
        service.server_side_copy(&from, &to, true).await?;
        assert!(service.contents(&from).is_none());
        assert_eq!(service.contents(&to), Some(b"data".to_vec()));
        Ok(())
    }
}
