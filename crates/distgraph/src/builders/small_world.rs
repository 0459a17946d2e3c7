//! Watts-Strogatz directed small-world builder: a ring lattice of
//! out-degree `k`, each edge independently rewired to a uniformly random
//! non-duplicate target with probability `rewire_probability`.

use std::collections::BTreeSet;

use distgraph_core::LayerId;
use distgraph_mpi::MpiContext;
use distgraph_pack::pack::PackSerialize;
use distgraph_pack::LightPackSerialize;

use crate::distributed_graph::DistributedGraph;
use crate::error::DistGraphResult;
use crate::rng::SimRng;

use super::{BuiltNodes, NodeBuilder};

/// Builds `n` nodes in a ring, connects each to its `k` nearest clockwise
/// neighbors, then rewires each of those edges independently with
/// probability `rewire_probability` to a uniformly sampled target distinct
/// from the source and from any target already chosen for that source.
pub fn build<T: PackSerialize + LightPackSerialize + Clone>(
    graph: &mut DistributedGraph<T>,
    ctx: &MpiContext,
    builder: &mut impl NodeBuilder<T>,
    n: usize,
    k: usize,
    rewire_probability: f64,
    layer: LayerId,
    seed: u64,
) -> DistGraphResult<BuiltNodes> {
    let mut rng = SimRng::new(seed);
    let mut handles = Vec::with_capacity(n);
    for i in 0..n {
        let data = builder.build(i, &mut rng);
        handles.push(graph.build_node(data, 1.0));
    }

    let degree = k.min(n.saturating_sub(1));
    for i in 0..n {
        let mut chosen: BTreeSet<usize> = BTreeSet::new();
        for step in 1..=degree {
            let ring_target = (i + step) % n;
            let target_idx = if rng.gen_bool(rewire_probability) || chosen.contains(&ring_target) {
                random_non_duplicate_target(&mut rng, n, i, &chosen)
            } else {
                ring_target
            };
            chosen.insert(target_idx);
            graph.link(ctx, handles[i], handles[target_idx], layer, 1.0)?;
        }
    }

    Ok(handles)
}

fn random_non_duplicate_target(
    rng: &mut SimRng,
    n: usize,
    source: usize,
    already_chosen: &BTreeSet<usize>,
) -> usize {
    loop {
        let candidate = rng.gen_range(0..n);
        if candidate != source && !already_chosen.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distgraph_core::RuntimeConfig;

    #[test]
    #[ignore = "requires an MPI launcher (mpirun -n 1 ...)"]
    fn every_node_gets_exactly_k_distinct_out_edges() {
        let config = RuntimeConfig::default();
        let mut graph: DistributedGraph<u32> = DistributedGraph::new(0, &config);
        let ctx = MpiContext::init();
        let mut builder = super::super::FnNodeBuilder(|i, _rng| i as u32);
        let handles = build(&mut graph, &ctx, &mut builder, 20, 4, 0.1, 0, 7).unwrap();

        for &id in &handles {
            let node = graph.graph().node(id).unwrap();
            assert_eq!(node.out_edges(0).len(), 4);
        }
    }

    #[test]
    fn zero_rewire_probability_never_rewires() {
        let mut rng = SimRng::new(99);
        for _ in 0..50 {
            assert!(!rng.gen_bool(0.0));
        }
    }

    #[test]
    fn full_rewire_probability_always_rewires() {
        let mut rng = SimRng::new(99);
        for _ in 0..50 {
            assert!(rng.gen_bool(1.0));
        }
    }
}
