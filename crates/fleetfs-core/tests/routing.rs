use std::sync::Arc;

use fleetfs_core::{
    Action, NodeTopology, PlacementContext, PlacementError, ResolvedRoot, ResourceDescriptor,
    Resolver, StaticTopology, Strategy, decide,
};

#[test]
fn external_to_cache_on_same_node_resolves_and_syncs_locally() -> anyhow::Result<()> {
    let topology: Arc<dyn NodeTopology> = Arc::new(StaticTopology::new("nodeX", ["nodeA"]));
    let source = ResourceDescriptor::parse(
        "alice",
        "/external/nodeA/disk0/report.pdf",
        topology.as_ref(),
    )?;
    let destination = ResourceDescriptor::parse("alice", "/cache/nodeA/report.pdf", topology.as_ref())?;

    let placement = decide(
        Action::Copy,
        &source,
        &destination,
        PlacementContext {
            current_node: "nodeA",
            master_node: &topology.master(),
        },
    )?;
    assert_eq!(placement.strategy, Strategy::LocalSync);
    placement.ensure_runs_on("nodeA")?;
    assert!(matches!(
        placement.ensure_runs_on("nodeX"),
        Err(PlacementError::WrongNode { .. })
    ));

    let resolver = Resolver::new("/data", Arc::clone(&topology));
    assert_eq!(
        resolver.resolve(&destination)?,
        ResolvedRoot::Local("/data/cache/alice".into())
    );
    assert_eq!(
        resolver.local_path(&source)?,
        Some("/data/external/disk0/report.pdf".into())
    );
    Ok(())
}
