//! Uniform random graph builder: every node links to `k` distinct targets
//! sampled uniformly from the rest of the graph.

use std::collections::BTreeSet;

use distgraph_core::LayerId;
use distgraph_mpi::MpiContext;
use distgraph_pack::pack::PackSerialize;
use distgraph_pack::LightPackSerialize;

use crate::distributed_graph::DistributedGraph;
use crate::error::DistGraphResult;
use crate::rng::SimRng;

use super::{BuiltNodes, NodeBuilder};

/// Builds `n` nodes, then links each to `k` distinct targets sampled
/// uniformly from the other nodes. `layer` labels every created edge.
pub fn build<T: PackSerialize + LightPackSerialize + Clone>(
    graph: &mut DistributedGraph<T>,
    ctx: &MpiContext,
    builder: &mut impl NodeBuilder<T>,
    n: usize,
    k: usize,
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
        let src = handles[i];
        let mut targets: BTreeSet<usize> = BTreeSet::new();
        while targets.len() < degree {
            let candidate = rng.gen_range(0..n);
            if candidate != i {
                targets.insert(candidate);
            }
        }
        for target_idx in targets {
            graph.link(ctx, src, handles[target_idx], layer, 1.0)?;
        }
    }

    Ok(handles)
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
        let handles = build(&mut graph, &ctx, &mut builder, 20, 4, 0, 42).unwrap();

        for &id in &handles {
            let node = graph.graph().node(id).unwrap();
            assert_eq!(node.out_edges(0).len(), 4);
        }
    }
}
