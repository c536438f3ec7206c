//! Logical path addressing.
//!
//! A raw path has the form `/<kind>/<qualifier>/<subpath...>`. Parsing turns it
//! into a [`ResourceDescriptor`]; a [`Resolver`] maps the descriptor to a local
//! filesystem root or a remote endpoint key. Both steps are pure.
//!
//! | kind | qualifier | example |
//! |---|---|---|
//! | `drive` | `home` / `data` | `/drive/home/docs/a.txt` |
//! | `cache` | node | `/cache/nodeA/a.txt` |
//! | `external` | node, then disk | `/external/nodeA/disk0/a.txt` |
//! | `sync` | repository id | `/sync/4f1c/docs/a.txt` |
//! | `awss3`, `google`, `dropbox`, `tencent` | account id | `/google/work/a.txt` |

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AddressError, AddressResult};
use crate::topology::NodeTopology;

/// Fixed areas of the cluster-wide home namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveArea {
    /// Personal files.
    Home,
    /// Shared application data.
    Data,
}

impl DriveArea {
    /// Case-insensitive qualifier lookup.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("home") {
            Some(Self::Home)
        } else if raw.eq_ignore_ascii_case("data") {
            Some(Self::Data)
        } else {
            None
        }
    }

    /// Directory name under the owner's subtree.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Data => "Data",
        }
    }
}

/// Third-party storage providers reached through the cloud transfer tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    /// S3-compatible object storage.
    AwsS3,
    /// Google Drive.
    Google,
    /// Dropbox.
    Dropbox,
    /// Tencent COS.
    Tencent,
}

impl CloudProvider {
    const ALL: [Self; 4] = [Self::AwsS3, Self::Google, Self::Dropbox, Self::Tencent];

    /// Path segment naming the provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwsS3 => "awss3",
            Self::Google => "google",
            Self::Dropbox => "dropbox",
            Self::Tencent => "tencent",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|provider| raw.eq_ignore_ascii_case(provider.as_str()))
    }
}

/// Backend a descriptor points into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Cluster-wide home namespace, authoritative on the master node.
    Home,
    /// Per-node cache.
    NodeCache,
    /// External disk attached to one node.
    NodeExternal {
        /// Disk identifier under the node's external mount.
        disk: String,
    },
    /// Document-collaboration repository.
    Collaboration,
    /// Cloud account.
    Cloud {
        /// Provider serving the account.
        provider: CloudProvider,
    },
}

impl ResourceKind {
    /// Path segment naming the kind.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Home => "drive",
            Self::NodeCache => "cache",
            Self::NodeExternal { .. } => "external",
            Self::Collaboration => "sync",
            Self::Cloud { provider } => provider.as_str(),
        }
    }

    /// Whether data for this kind lives on exactly one node.
    #[must_use]
    pub const fn is_node_pinned(&self) -> bool {
        matches!(self, Self::NodeCache | Self::NodeExternal { .. })
    }
}

/// Parsed logical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Owning user.
    pub owner: String,
    /// Backend kind.
    pub kind: ResourceKind,
    /// Node, drive area, repository or account depending on `kind`.
    pub qualifier: String,
    /// Slash-separated sub-path below the backend root; empty for the root itself.
    pub path: String,
}

impl ResourceDescriptor {
    /// Parse `raw` on behalf of `owner`, validating node-pinned qualifiers against `topology`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidAddress`] for malformed paths or unknown kinds and
    /// [`AddressError::UnknownQualifier`] when the qualifier cannot be resolved.
    pub fn parse(owner: &str, raw: &str, topology: &dyn NodeTopology) -> AddressResult<Self> {
        let invalid = |reason| AddressError::InvalidAddress {
            path: raw.to_string(),
            reason,
        };
        if owner.is_empty() || owner.contains(['/', '\0']) || owner == ".." || owner == "." {
            return Err(invalid("invalid_owner"));
        }
        if raw.contains('\0') {
            return Err(invalid("nul_byte"));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(invalid("parent_segment")),
                other => segments.push(other),
            }
        }
        if segments.len() < 2 {
            return Err(invalid("too_few_segments"));
        }

        let kind_segment = segments[0];
        let qualifier = segments[1];
        let mut rest = &segments[2..];

        let (kind, qualifier) = if kind_segment.eq_ignore_ascii_case("drive") {
            let area = DriveArea::parse(qualifier).ok_or_else(|| AddressError::UnknownQualifier {
                kind: "drive",
                qualifier: qualifier.to_string(),
            })?;
            (ResourceKind::Home, area.dir_name().to_string())
        } else if kind_segment.eq_ignore_ascii_case("cache") {
            require_node("cache", qualifier, topology)?;
            (ResourceKind::NodeCache, qualifier.to_string())
        } else if kind_segment.eq_ignore_ascii_case("external") {
            require_node("external", qualifier, topology)?;
            let Some((disk, tail)) = rest.split_first() else {
                return Err(invalid("missing_disk"));
            };
            rest = tail;
            (
                ResourceKind::NodeExternal {
                    disk: (*disk).to_string(),
                },
                qualifier.to_string(),
            )
        } else if kind_segment.eq_ignore_ascii_case("sync") {
            (ResourceKind::Collaboration, qualifier.to_string())
        } else if let Some(provider) = CloudProvider::parse(kind_segment) {
            (ResourceKind::Cloud { provider }, qualifier.to_string())
        } else {
            return Err(invalid("unknown_kind"));
        };

        Ok(Self {
            owner: owner.to_string(),
            kind,
            qualifier,
            path: rest.join("/"),
        })
    }

    /// Node holding the data when the kind is node-pinned.
    #[must_use]
    pub fn pinned_node(&self) -> Option<&str> {
        self.kind
            .is_node_pinned()
            .then_some(self.qualifier.as_str())
    }

    /// Final path component, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.kind.label(), self.qualifier)?;
        if let ResourceKind::NodeExternal { disk } = &self.kind {
            write!(f, "/{disk}")?;
        }
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        Ok(())
    }
}

fn require_node(kind: &'static str, node: &str, topology: &dyn NodeTopology) -> AddressResult<()> {
    if topology.contains(node) {
        Ok(())
    } else {
        Err(AddressError::UnknownQualifier {
            kind,
            qualifier: node.to_string(),
        })
    }
}

/// Remote endpoints addressed by key rather than by filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteEndpoint {
    /// Repository on the collaboration service.
    Collaboration {
        /// Repository identifier.
        repo_id: String,
    },
    /// Remote configured in the cloud transfer tool.
    Cloud {
        /// Remote name, `<provider>_<owner>_<account>`.
        remote: String,
    },
}

/// Concrete root a descriptor resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedRoot {
    /// Directory on this node's filesystem.
    Local(PathBuf),
    /// Remote endpoint key.
    Remote(RemoteEndpoint),
}

impl ResolvedRoot {
    /// Absolute path for `subpath` when the root is local.
    #[must_use]
    pub fn local_path(&self, subpath: &str) -> Option<PathBuf> {
        match self {
            Self::Local(root) if subpath.is_empty() => Some(root.clone()),
            Self::Local(root) => Some(root.join(subpath)),
            Self::Remote(_) => None,
        }
    }
}

/// Maps descriptors to concrete roots under a fixed data prefix.
#[derive(Clone)]
pub struct Resolver {
    data_root: PathBuf,
    topology: Arc<dyn NodeTopology>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("data_root", &self.data_root)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Build a resolver rooted at `data_root`.
    #[must_use]
    pub fn new(data_root: impl Into<PathBuf>, topology: Arc<dyn NodeTopology>) -> Self {
        Self {
            data_root: data_root.into(),
            topology,
        }
    }

    /// Topology consulted by this resolver.
    #[must_use]
    pub fn topology(&self) -> &Arc<dyn NodeTopology> {
        &self.topology
    }

    /// Resolve the root for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::UnknownQualifier`] when a node-pinned qualifier is no longer a
    /// fleet member or a remote qualifier is empty.
    pub fn resolve(&self, descriptor: &ResourceDescriptor) -> AddressResult<ResolvedRoot> {
        let unknown = || AddressError::UnknownQualifier {
            kind: descriptor.kind.label(),
            qualifier: descriptor.qualifier.clone(),
        };
        match &descriptor.kind {
            ResourceKind::Home => {
                let area = DriveArea::parse(&descriptor.qualifier).ok_or_else(unknown)?;
                Ok(ResolvedRoot::Local(
                    self.data_root.join(&descriptor.owner).join(area.dir_name()),
                ))
            }
            ResourceKind::NodeCache => {
                require_node("cache", &descriptor.qualifier, self.topology.as_ref())?;
                Ok(ResolvedRoot::Local(
                    self.data_root.join("cache").join(&descriptor.owner),
                ))
            }
            ResourceKind::NodeExternal { disk } => {
                require_node("external", &descriptor.qualifier, self.topology.as_ref())?;
                Ok(ResolvedRoot::Local(self.data_root.join("external").join(disk)))
            }
            ResourceKind::Collaboration => {
                if descriptor.qualifier.is_empty() {
                    return Err(unknown());
                }
                Ok(ResolvedRoot::Remote(RemoteEndpoint::Collaboration {
                    repo_id: descriptor.qualifier.clone(),
                }))
            }
            ResourceKind::Cloud { provider } => {
                if descriptor.qualifier.is_empty() {
                    return Err(unknown());
                }
                Ok(ResolvedRoot::Remote(RemoteEndpoint::Cloud {
                    remote: format!(
                        "{}_{}_{}",
                        provider.as_str(),
                        descriptor.owner,
                        descriptor.qualifier
                    ),
                }))
            }
        }
    }

    /// Absolute local path for a descriptor, `None` for remote kinds.
    ///
    /// # Errors
    ///
    /// Propagates [`Resolver::resolve`] failures.
    pub fn local_path(&self, descriptor: &ResourceDescriptor) -> AddressResult<Option<PathBuf>> {
        Ok(self.resolve(descriptor)?.local_path(&descriptor.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::StaticTopology;

    fn topology() -> Arc<dyn NodeTopology> {
        Arc::new(StaticTopology::new("nodeX", ["nodeA", "nodeB"]))
    }

    fn parse(raw: &str) -> AddressResult<ResourceDescriptor> {
        ResourceDescriptor::parse("alice", raw, topology().as_ref())
    }

    #[test]
    fn parses_every_kind() -> Result<(), AddressError> {
        let home = parse("/DRIVE/home/docs/a.txt")?;
        assert_eq!(home.kind, ResourceKind::Home);
        assert_eq!(home.qualifier, "Home");
        assert_eq!(home.path, "docs/a.txt");

        let cache = parse("/cache/nodeA/report.pdf")?;
        assert_eq!(cache.kind, ResourceKind::NodeCache);
        assert_eq!(cache.pinned_node(), Some("nodeA"));

        let external = parse("/external/nodeB/disk0/media/clip.mp4")?;
        assert_eq!(
            external.kind,
            ResourceKind::NodeExternal {
                disk: "disk0".into()
            }
        );
        assert_eq!(external.path, "media/clip.mp4");
        assert_eq!(external.file_name(), Some("clip.mp4"));

        let sync = parse("/sync/repo-1/notes.md")?;
        assert_eq!(sync.kind, ResourceKind::Collaboration);
        assert_eq!(sync.pinned_node(), None);

        let cloud = parse("/Google/work/a.txt")?;
        assert_eq!(
            cloud.kind,
            ResourceKind::Cloud {
                provider: CloudProvider::Google
            }
        );
        assert_eq!(cloud.qualifier, "work");
        Ok(())
    }

    #[test]
    fn malformed_paths_are_invalid() {
        for (raw, reason) in [
            ("/", "too_few_segments"),
            ("/cache", "too_few_segments"),
            ("/ftp/server/a.txt", "unknown_kind"),
            ("/cache/nodeA/../etc/passwd", "parent_segment"),
            ("/cache/nodeA/a\0b", "nul_byte"),
            ("/external/nodeA", "missing_disk"),
        ] {
            assert_eq!(
                parse(raw),
                Err(AddressError::InvalidAddress {
                    path: raw.to_string(),
                    reason,
                }),
                "{raw}"
            );
        }
    }

    #[test]
    fn node_pinned_kinds_require_known_nodes() {
        for raw in ["/cache/nodeZ/a.txt", "/external/nodeZ/disk0/a.txt"] {
            assert!(matches!(
                parse(raw),
                Err(AddressError::UnknownQualifier { qualifier, .. }) if qualifier == "nodeZ"
            ));
        }
        assert!(matches!(
            parse("/drive/music/a.mp3"),
            Err(AddressError::UnknownQualifier { kind: "drive", .. })
        ));
    }

    #[test]
    fn repeated_slashes_collapse_and_display_is_canonical() -> Result<(), AddressError> {
        let descriptor = parse("//external//nodeA/disk0///a//b.txt")?;
        assert_eq!(descriptor.path, "a/b.txt");
        assert_eq!(descriptor.to_string(), "/external/nodeA/disk0/a/b.txt");
        Ok(())
    }

    #[test]
    fn resolution_is_deterministic() -> Result<(), AddressError> {
        let resolver = Resolver::new("/data", topology());
        let cases = [
            ("/drive/data/x", ResolvedRoot::Local(PathBuf::from("/data/alice/Data"))),
            ("/cache/nodeA/x", ResolvedRoot::Local(PathBuf::from("/data/cache/alice"))),
            (
                "/external/nodeA/disk0/x",
                ResolvedRoot::Local(PathBuf::from("/data/external/disk0")),
            ),
            (
                "/sync/repo-1/x",
                ResolvedRoot::Remote(RemoteEndpoint::Collaboration {
                    repo_id: "repo-1".into(),
                }),
            ),
            (
                "/dropbox/personal/x",
                ResolvedRoot::Remote(RemoteEndpoint::Cloud {
                    remote: "dropbox_alice_personal".into(),
                }),
            ),
        ];
        for (raw, expected) in cases {
            let first = parse(raw)?;
            let second = parse(raw)?;
            assert_eq!(first, second);
            assert_eq!(resolver.resolve(&first)?, expected);
            assert_eq!(resolver.resolve(&second)?, expected);
        }
        Ok(())
    }

    #[test]
    fn local_paths_join_subpath() -> Result<(), AddressError> {
        let resolver = Resolver::new("/data", topology());
        let descriptor = parse("/external/nodeA/disk0/report.pdf")?;
        assert_eq!(
            resolver.local_path(&descriptor)?,
            Some(PathBuf::from("/data/external/disk0/report.pdf"))
        );
        let remote = parse("/awss3/bucket/report.pdf")?;
        assert_eq!(resolver.local_path(&remote)?, None);
        Ok(())
    }

    #[test]
    fn resolve_rejects_nodes_that_left_the_fleet() -> Result<(), AddressError> {
        let descriptor = parse("/cache/nodeB/x")?;
        let shrunk = Resolver::new("/data", Arc::new(StaticTopology::new("nodeX", ["nodeA"])));
        assert!(matches!(
            shrunk.resolve(&descriptor),
            Err(AddressError::UnknownQualifier { kind: "cache", .. })
        ));
        Ok(())
    }
}
