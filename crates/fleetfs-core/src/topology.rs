//! Fleet membership consulted by addressing and placement.

use std::collections::BTreeSet;

/// Read-only view of the fleet: known nodes and the elected master.
pub trait NodeTopology: Send + Sync {
    /// Whether `node` is a known fleet member.
    fn contains(&self, node: &str) -> bool;

    /// Currently elected master node.
    fn master(&self) -> String;

    /// All known nodes, sorted.
    fn nodes(&self) -> Vec<String>;
}

/// Topology fixed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTopology {
    master: String,
    nodes: BTreeSet<String>,
}

impl StaticTopology {
    /// Build a topology; the master is always a member.
    #[must_use]
    pub fn new<I, S>(master: impl Into<String>, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let master = master.into();
        let mut nodes: BTreeSet<String> = nodes.into_iter().map(Into::into).collect();
        nodes.insert(master.clone());
        Self { master, nodes }
    }
}

impl NodeTopology for StaticTopology {
    fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    fn master(&self) -> String {
        self.master.clone()
    }

    fn nodes(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }
}
