//! Placement policy: which node must execute a transfer, and how.
//!
//! # Design
//! - [`decide`] is pure; it never touches the network or the filesystem.
//! - The cluster-wide home namespace is authoritative on the master, so any
//!   route touching it runs there, including routes to or from node-pinned storage.
//! - Between two node-pinned endpoints the destination node pulls.
//! - The caller enforces the result with [`Placement::ensure_runs_on`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{ResourceDescriptor, ResourceKind};
use crate::error::{PlacementError, PlacementResult};
use crate::model::{Action, Strategy};

/// Identity of the node serving the request and the elected master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementContext<'a> {
    /// Node serving the request.
    pub current_node: &'a str,
    /// Elected master node.
    pub master_node: &'a str,
}

/// Which side of a node-to-node transfer the peer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    /// The peer holds the source; bytes are pulled from it.
    Source,
    /// The peer holds the destination; bytes are pushed to it.
    Destination,
}

/// Remote node involved in a [`Strategy::PullFromNode`] transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerNode {
    /// Peer node name.
    pub node: String,
    /// Side of the transfer living on the peer.
    pub role: PeerRole,
}

/// Result of a placement decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Transfer mechanism.
    pub strategy: Strategy,
    /// Node that must execute the transfer.
    pub required_node: String,
    /// Remote node for node-to-node transfers.
    pub peer: Option<PeerNode>,
}

impl Placement {
    fn on(strategy: Strategy, node: &str) -> Self {
        Self {
            strategy,
            required_node: node.to_string(),
            peer: None,
        }
    }

    fn between(local: &str, peer: &str, role: PeerRole) -> Self {
        if local == peer {
            return Self::on(Strategy::LocalSync, local);
        }
        Self {
            strategy: Strategy::PullFromNode,
            required_node: local.to_string(),
            peer: Some(PeerNode {
                node: peer.to_string(),
                role,
            }),
        }
    }

    /// Whether the source is read from the required node's own filesystem.
    #[must_use]
    pub fn reads_locally(&self) -> bool {
        match self.strategy {
            Strategy::LocalSync | Strategy::PushToCollaboration | Strategy::PushToCloud => true,
            Strategy::PullFromNode => self.peer_role() == Some(PeerRole::Destination),
            _ => false,
        }
    }

    /// Whether the destination is written to the required node's own filesystem.
    #[must_use]
    pub fn writes_locally(&self) -> bool {
        match self.strategy {
            Strategy::LocalSync | Strategy::PullFromCollaboration | Strategy::PullFromCloud => true,
            Strategy::PullFromNode => self.peer_role() == Some(PeerRole::Source),
            _ => false,
        }
    }

    fn peer_role(&self) -> Option<PeerRole> {
        self.peer.as_ref().map(|peer| peer.role)
    }

    /// Fail with [`PlacementError::WrongNode`] unless `current_node` is the required node.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::WrongNode`] on mismatch.
    pub fn ensure_runs_on(&self, current_node: &str) -> PlacementResult<()> {
        if self.required_node == current_node {
            Ok(())
        } else {
            Err(PlacementError::WrongNode {
                required: self.required_node.clone(),
                current: current_node.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side<'a> {
    Home,
    Pinned(&'a str),
    Collaboration,
    Cloud,
}

impl<'a> Side<'a> {
    fn of(descriptor: &'a ResourceDescriptor) -> Self {
        match descriptor.kind {
            ResourceKind::Home => Self::Home,
            ResourceKind::NodeCache | ResourceKind::NodeExternal { .. } => {
                Self::Pinned(descriptor.qualifier.as_str())
            }
            ResourceKind::Collaboration => Self::Collaboration,
            ResourceKind::Cloud { .. } => Self::Cloud,
        }
    }

    const fn is_filesystem(self) -> bool {
        matches!(self, Self::Home | Self::Pinned(_))
    }
}

/// Decide the strategy and required node for moving `source` to `destination`.
///
/// # Errors
///
/// Returns [`PlacementError::UnsupportedRoute`] between collaboration and cloud backends and
/// [`PlacementError::UnsupportedAction`] for uploads that do not start on a filesystem and
/// for moves out of a collaboration repository onto a filesystem.
pub fn decide(
    action: Action,
    source: &ResourceDescriptor,
    destination: &ResourceDescriptor,
    ctx: PlacementContext<'_>,
) -> PlacementResult<Placement> {
    let master = ctx.master_node;
    let from = Side::of(source);
    let to = Side::of(destination);

    let unsupported = match action {
        Action::Upload => !from.is_filesystem(),
        // Collaboration deletes stay with the service; only server-side moves can remove.
        Action::Move => matches!(from, Side::Collaboration) && to.is_filesystem(),
        Action::Copy => false,
    };
    if unsupported {
        return Err(PlacementError::UnsupportedAction {
            action: action.as_str(),
            from_kind: source.kind.label(),
        });
    }

    let placement = match (from, to) {
        (Side::Pinned(a), Side::Pinned(b)) => Placement::between(b, a, PeerRole::Source),
        (Side::Home, Side::Pinned(node)) => Placement::between(master, node, PeerRole::Destination),
        (Side::Pinned(node), Side::Home) => Placement::between(master, node, PeerRole::Source),
        (Side::Home, Side::Home) => Placement::on(Strategy::LocalSync, master),

        (Side::Home, Side::Collaboration) => Placement::on(Strategy::PushToCollaboration, master),
        (Side::Collaboration, Side::Home) => Placement::on(Strategy::PullFromCollaboration, master),
        (Side::Home, Side::Cloud) => Placement::on(Strategy::PushToCloud, master),
        (Side::Cloud, Side::Home) => Placement::on(Strategy::PullFromCloud, master),

        (Side::Pinned(node), Side::Collaboration) => {
            Placement::on(Strategy::PushToCollaboration, node)
        }
        (Side::Collaboration, Side::Pinned(node)) => {
            Placement::on(Strategy::PullFromCollaboration, node)
        }
        (Side::Pinned(node), Side::Cloud) => Placement::on(Strategy::PushToCloud, node),
        (Side::Cloud, Side::Pinned(node)) => Placement::on(Strategy::PullFromCloud, node),

        (Side::Collaboration, Side::Collaboration) => {
            Placement::on(Strategy::CollaborationServerSideCopy, master)
        }
        (Side::Cloud, Side::Cloud) => Placement::on(Strategy::CloudServerSideCopy, master),

        (Side::Collaboration, Side::Cloud) | (Side::Cloud, Side::Collaboration) => {
            return Err(PlacementError::UnsupportedRoute {
                from_kind: source.kind.label(),
                to_kind: destination.kind.label(),
            });
        }
    };

    debug!(
        action = action.as_str(),
        from = source.kind.label(),
        to = destination.kind.label(),
        strategy = placement.strategy.as_str(),
        required_node = %placement.required_node,
        current_node = ctx.current_node,
        "placement decided"
    );
    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ResourceDescriptor;
    use crate::topology::StaticTopology;

    fn parse(raw: &str) -> ResourceDescriptor {
        let topology = StaticTopology::new("nodeX", ["nodeA", "nodeB"]);
        ResourceDescriptor::parse("alice", raw, &topology).expect("valid test path")
    }

    fn ctx<'a>(current: &'a str, master: &'a str) -> PlacementContext<'a> {
        PlacementContext {
            current_node: current,
            master_node: master,
        }
    }

    #[test]
    fn same_node_pinned_endpoints_sync_locally() -> PlacementResult<()> {
        let placement = decide(
            Action::Copy,
            &parse("/external/nodeA/disk0/report.pdf"),
            &parse("/external/nodeA/disk1/report.pdf"),
            ctx("nodeA", "nodeX"),
        )?;
        assert_eq!(placement.strategy, Strategy::LocalSync);
        assert_eq!(placement.required_node, "nodeA");
        assert_eq!(placement.peer, None);
        placement.ensure_runs_on("nodeA")
    }

    #[test]
    fn different_nodes_pull_at_destination() -> PlacementResult<()> {
        for current in ["nodeA", "nodeB", "nodeX"] {
            let placement = decide(
                Action::Copy,
                &parse("/external/nodeA/disk0/a"),
                &parse("/external/nodeB/disk0/a"),
                ctx(current, "nodeX"),
            )?;
            assert_eq!(placement.strategy, Strategy::PullFromNode);
            assert_eq!(placement.required_node, "nodeB");
            assert_eq!(
                placement.peer,
                Some(PeerNode {
                    node: "nodeA".into(),
                    role: PeerRole::Source
                })
            );
        }
        Ok(())
    }

    #[test]
    fn home_routes_run_on_master_regardless_of_pinned_node() -> PlacementResult<()> {
        let placement = decide(
            Action::Copy,
            &parse("/drive/home/a"),
            &parse("/cache/nodeA/a"),
            ctx("nodeA", "nodeX"),
        )?;
        assert_eq!(placement.required_node, "nodeX");
        assert_eq!(placement.strategy, Strategy::PullFromNode);
        assert_eq!(
            placement.peer.map(|peer| peer.role),
            Some(PeerRole::Destination)
        );

        let on_master = decide(
            Action::Copy,
            &parse("/cache/nodeX/a"),
            &parse("/drive/data/a"),
            ctx("nodeX", "nodeX"),
        )?;
        assert_eq!(on_master.strategy, Strategy::LocalSync);
        assert_eq!(on_master.required_node, "nodeX");
        Ok(())
    }

    #[test]
    fn remote_backends_pick_push_or_pull_by_side() -> PlacementResult<()> {
        let master = ctx("nodeX", "nodeX");
        let cases = [
            ("/drive/home/a", "/sync/repo/a", Strategy::PushToCollaboration, "nodeX"),
            ("/sync/repo/a", "/drive/home/a", Strategy::PullFromCollaboration, "nodeX"),
            ("/drive/home/a", "/google/work/a", Strategy::PushToCloud, "nodeX"),
            ("/awss3/bucket/a", "/drive/home/a", Strategy::PullFromCloud, "nodeX"),
            ("/cache/nodeA/a", "/sync/repo/a", Strategy::PushToCollaboration, "nodeA"),
            ("/sync/repo/a", "/external/nodeB/d/a", Strategy::PullFromCollaboration, "nodeB"),
            ("/external/nodeB/d/a", "/dropbox/p/a", Strategy::PushToCloud, "nodeB"),
            ("/tencent/cos/a", "/cache/nodeA/a", Strategy::PullFromCloud, "nodeA"),
            ("/sync/r1/a", "/sync/r2/a", Strategy::CollaborationServerSideCopy, "nodeX"),
            ("/google/w/a", "/awss3/b/a", Strategy::CloudServerSideCopy, "nodeX"),
        ];
        for (from, to, strategy, node) in cases {
            let placement = decide(Action::Copy, &parse(from), &parse(to), master)?;
            assert_eq!(placement.strategy, strategy, "{from} -> {to}");
            assert_eq!(placement.required_node, node, "{from} -> {to}");
        }
        Ok(())
    }

    #[test]
    fn unsupported_routes_and_actions_are_rejected() {
        assert_eq!(
            decide(
                Action::Copy,
                &parse("/sync/repo/a"),
                &parse("/google/w/a"),
                ctx("nodeX", "nodeX"),
            ),
            Err(PlacementError::UnsupportedRoute {
                from_kind: "sync",
                to_kind: "google",
            })
        );
        assert_eq!(
            decide(
                Action::Upload,
                &parse("/google/w/a"),
                &parse("/drive/home/a"),
                ctx("nodeX", "nodeX"),
            ),
            Err(PlacementError::UnsupportedAction {
                action: "upload",
                from_kind: "google",
            })
        );
        assert_eq!(
            decide(
                Action::Move,
                &parse("/sync/repo/a"),
                &parse("/cache/nodeA/a"),
                ctx("nodeA", "nodeX"),
            ),
            Err(PlacementError::UnsupportedAction {
                action: "move",
                from_kind: "sync",
            })
        );
        assert!(
            decide(
                Action::Move,
                &parse("/sync/repo/a"),
                &parse("/sync/other/a"),
                ctx("nodeX", "nodeX"),
            )
            .is_ok()
        );
    }

    #[test]
    fn locality_follows_the_peer_role() -> PlacementResult<()> {
        let pull = decide(
            Action::Copy,
            &parse("/external/nodeA/disk0/a"),
            &parse("/cache/nodeB/a"),
            ctx("nodeB", "nodeX"),
        )?;
        assert!(pull.writes_locally());
        assert!(!pull.reads_locally());

        let push_out = decide(
            Action::Copy,
            &parse("/drive/home/a"),
            &parse("/cache/nodeA/a"),
            ctx("nodeX", "nodeX"),
        )?;
        assert!(push_out.reads_locally());
        assert!(!push_out.writes_locally());

        let server_side = decide(
            Action::Copy,
            &parse("/google/w/a"),
            &parse("/google/w/b"),
            ctx("nodeX", "nodeX"),
        )?;
        assert!(!server_side.reads_locally());
        assert!(!server_side.writes_locally());
        Ok(())
    }

    #[test]
    fn wrong_node_is_reported() -> PlacementResult<()> {
        let placement = decide(
            Action::Move,
            &parse("/cache/nodeA/a"),
            &parse("/cache/nodeA/b"),
            ctx("nodeB", "nodeX"),
        )?;
        assert_eq!(
            placement.ensure_runs_on("nodeB"),
            Err(PlacementError::WrongNode {
                required: "nodeA".into(),
                current: "nodeB".into(),
            })
        );
        Ok(())
    }
}
