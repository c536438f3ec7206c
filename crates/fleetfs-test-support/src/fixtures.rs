//! Test fixtures and environment helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleetfs_core::{NodeTopology, StaticTopology};
use tempfile::TempDir;

/// Fresh scratch directory removed on drop.
///
/// # Errors
///
/// Returns an error when the directory cannot be created.
pub fn scratch_dir() -> io::Result<TempDir> {
    tempfile::Builder::new().prefix("fleetfs-").tempdir()
}

/// Topology with `master` plus `nodes`.
#[must_use]
pub fn fleet(master: &str, nodes: &[&str]) -> Arc<dyn NodeTopology> {
    Arc::new(StaticTopology::new(master, nodes.iter().copied()))
}

/// Write `len` deterministic bytes to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
#[allow(clippy::cast_possible_truncation)]
pub fn write_payload(path: &Path, len: usize) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes: Vec<u8> = (0..len).map(|idx| (idx % 251) as u8).collect();
    fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_are_deterministic() -> io::Result<()> {
        let dir = scratch_dir()?;
        let first = write_payload(&dir.path().join("a/b.bin"), 600)?;
        let second = write_payload(&dir.path().join("c.bin"), 600)?;
        assert_eq!(fs::read(first)?, fs::read(second)?);
        Ok(())
    }

    #[test]
    fn fleet_includes_master() {
        let topology = fleet("nodeX", &["nodeA"]);
        assert!(topology.contains("nodeX"));
        assert!(topology.contains("nodeA"));
    }
}
