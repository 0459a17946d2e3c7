//! End-to-end scenarios exercising `DistributedGraph` across real MPI
//! ranks. Every test here needs a live `MpiContext`, which only exists
//! inside a process started by an MPI launcher, so each is `#[ignore]`d
//! and meant to be run by hand, e.g.:
//!
//!   mpirun -n 4 cargo test --test scenarios -- --ignored s1_ring_migration

use std::collections::BTreeMap;

use distgraph::builders::uniform;
use distgraph::{DistributedId, DistributedGraph, MpiContext, RuntimeConfig, SyncMode};

#[test]
#[ignore = "requires an MPI launcher (mpirun -n 4 ...)"]
fn s1_ring_migration() {
    let ctx = MpiContext::init();
    assert_eq!(ctx.size(), 4, "this scenario is defined for exactly 4 processes");

    let config = RuntimeConfig::default();
    let mut graph: DistributedGraph<u32> = DistributedGraph::new(ctx.rank(), &config);

    if ctx.rank() == 0 {
        for _ in 0..4 {
            graph.build_node(0, 1.0);
        }
    }
    ctx.barrier();

    if ctx.rank() == 0 {
        let nodes: Vec<DistributedId> = graph.graph().nodes().map(|n| n.id()).collect();
        for i in 0..nodes.len() {
            let src = nodes[i];
            let tgt = nodes[(i + 1) % nodes.len()];
            graph.link(&ctx, src, tgt, 0, 1.0).unwrap();
        }
    }
    ctx.barrier();

    if ctx.rank() == 0 {
        let mut partition = BTreeMap::new();
        for (rank, &id) in graph
            .graph()
            .nodes()
            .map(|n| n.id())
            .collect::<Vec<_>>()
            .iter()
            .enumerate()
        {
            partition.insert(id, rank as i32);
        }
        graph.distribute(&ctx, &partition).unwrap();
    } else {
        graph.distribute(&ctx, &BTreeMap::new()).unwrap();
    }
    ctx.barrier();

    let local_count = graph
        .graph()
        .nodes()
        .filter(|n| n.location() == ctx.rank())
        .count();
    assert_eq!(local_count, 1);
    assert_eq!(graph.graph().node_count(), 3);
    assert_eq!(graph.graph().edge_count(), 2);
}

#[test]
#[ignore = "requires an MPI launcher (mpirun -n 2 ...)"]
fn s2_orphan_clearing() {
    let ctx = MpiContext::init();
    assert_eq!(ctx.size(), 2, "this scenario is defined for exactly 2 processes");

    let config = RuntimeConfig::default();
    let mut graph: DistributedGraph<u32> = DistributedGraph::new(ctx.rank(), &config);

    // Build A -> B on proc 0, then move B to proc 1 so proc 0 is left
    // holding a ghost of B with exactly one incident edge.
    let (a, b) = if ctx.rank() == 0 {
        let a = graph.build_node(1, 1.0);
        let b = graph.build_node(2, 1.0);
        let edge = graph.link(&ctx, a, b, 0, 1.0).unwrap();
        let mut partition = BTreeMap::new();
        partition.insert(b, 1);
        graph.distribute(&ctx, &partition).unwrap();
        (Some(a), Some((b, edge)))
    } else {
        graph.distribute(&ctx, &BTreeMap::new()).unwrap();
        (None, None)
    };
    ctx.barrier();

    if let (Some(_a), Some((b, _))) = (a, b) {
        assert!(graph.graph().contains_node(b), "B should be a ghost on proc 0 after the move");

        let edge_to_b = graph.graph().incident_edges(b)[0];
        graph.unlink(&ctx, edge_to_b).unwrap();
        graph.synchronize(&ctx).unwrap();

        assert!(
            !graph.graph().contains_node(b),
            "B's ghost should have been reclaimed once it lost its last incident edge"
        );
    } else {
        graph.synchronize(&ctx).unwrap();
    }
    ctx.barrier();
}

#[test]
#[ignore = "requires an MPI launcher (mpirun -n 2 ...)"]
fn s3_ghost_data_refresh() {
    let ctx = MpiContext::init();
    assert_eq!(ctx.size(), 2, "this scenario is defined for exactly 2 processes");

    let config = RuntimeConfig::default();
    let mut graph: DistributedGraph<u32> = DistributedGraph::new(ctx.rank(), &config);

    // A lives on proc 0 and B on proc 1; moving A's home but keeping B put
    // leaves proc 1 holding a ghost of A after the first distribute.
    let a = if ctx.rank() == 0 {
        let a = graph.build_node(42, 1.0);
        let b = graph.build_node(0, 1.0);
        graph.link(&ctx, a, b, 0, 1.0).unwrap();
        let mut partition = BTreeMap::new();
        partition.insert(b, 1);
        graph.distribute(&ctx, &partition).unwrap();
        Some(a)
    } else {
        graph.distribute(&ctx, &BTreeMap::new()).unwrap();
        None
    };
    ctx.barrier();

    if let Some(a) = a {
        if let Some(node) = graph.graph().node_mut(a) {
            node.set_data(100);
        }
        graph.synchronize(&ctx).unwrap();
    } else {
        graph.synchronize(&ctx).unwrap();
        let ghost_a = graph
            .graph()
            .nodes()
            .find(|n| n.state() == distgraph::LocationState::Distant)
            .map(|n| n.id())
            .expect("proc 1 should hold a ghost of A");
        assert_eq!(*graph.graph().node(ghost_a).unwrap().data(), 100);
    }
    ctx.barrier();
}

#[test]
#[ignore = "requires an MPI launcher (mpirun -n 3 ...)"]
fn s4_hard_sync_readers_writers() {
    let ctx = MpiContext::init();
    assert_eq!(ctx.size(), 3, "this scenario is defined for exactly 3 processes");

    let config = RuntimeConfig {
        sync_mode: SyncMode::Hard,
        ..RuntimeConfig::default()
    };
    let mut graph: DistributedGraph<u32> = DistributedGraph::new(ctx.rank(), &config);

    if ctx.rank() == 0 {
        let _x = graph.build_node(7, 1.0);
    }
    ctx.barrier();

    // Only proc 0 knows X's id directly; procs 1/2 would normally learn
    // it via a prior link/import. This scenario checks liveness of the
    // pump loop rather than the full acquire race, which needs the id
    // propagated first.
    graph.synchronize(&ctx).unwrap();
    ctx.barrier();
}

#[test]
#[ignore = "requires an MPI launcher (mpirun -n 4 ...)"]
fn s5_small_world_builder_properties() {
    let ctx = MpiContext::init();
    let config = RuntimeConfig::default();
    let mut graph: DistributedGraph<u32> = DistributedGraph::new(ctx.rank(), &config);

    let size = ctx.size() as usize;
    let n = 4 * size;
    let k = size;

    if ctx.rank() == 0 {
        let mut builder = distgraph::builders::FnNodeBuilder(|i, _rng| i as u32);
        let handles =
            distgraph::builders::small_world::build(&mut graph, &ctx, &mut builder, n, k, 0.1, 0, 11)
                .unwrap();

        assert_eq!(graph.graph().edge_count(), n * k);
        for &id in &handles {
            let node = graph.graph().node(id).unwrap();
            let mut seen = std::collections::BTreeSet::new();
            for edge_id in node.out_edges(0) {
                let edge = graph.graph().edge(*edge_id).unwrap();
                assert!(seen.insert(edge.target()), "duplicate outgoing neighbor");
            }
        }
    }
    ctx.barrier();
}

#[test]
#[ignore = "requires an MPI launcher (mpirun -n 1 ...)"]
fn uniform_builder_respects_degree_on_single_rank() {
    let ctx = MpiContext::init();
    let config = RuntimeConfig::default();
    let mut graph: DistributedGraph<u32> = DistributedGraph::new(ctx.rank(), &config);
    let mut builder = distgraph::builders::FnNodeBuilder(|i, _rng| i as u32);
    let handles = uniform::build(&mut graph, &ctx, &mut builder, 10, 3, 0, 5).unwrap();
    for &id in &handles {
        assert_eq!(graph.graph().node(id).unwrap().out_edges(0).len(), 3);
    }
}
