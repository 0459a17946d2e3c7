//! Small read-only graph analyses used by builder tests and example
//! callers to sanity-check a freshly built graph's structure.

use std::collections::BTreeSet;

use distgraph_core::{DistributedId, Graph};

/// Fraction of ordered pairs among `node`'s neighbors (both directions,
/// any layer, excluding `node` itself) that are themselves connected by a
/// local edge. Returns 0.0 for neighborhoods smaller than 2, since no pair
/// exists to measure.
pub fn local_clustering_coefficient<T>(graph: &Graph<T>, node: DistributedId) -> f64 {
    let neighbors: BTreeSet<DistributedId> = graph
        .incident_edges(node)
        .into_iter()
        .filter_map(|edge_id| graph.edge(edge_id))
        .flat_map(|edge| [edge.source(), edge.target()])
        .filter(|&id| id != node)
        .collect();

    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }

    let mut connected_pairs = 0usize;
    for &a in &neighbors {
        for &b in &neighbors {
            if a == b {
                continue;
            }
            if graph
                .incident_edges(a)
                .into_iter()
                .filter_map(|edge_id| graph.edge(edge_id))
                .any(|edge| edge.source() == a && edge.target() == b)
            {
                connected_pairs += 1;
            }
        }
    }

    connected_pairs as f64 / (k * (k - 1)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use distgraph_core::{DistEdge, DistNode, LocationState};

    fn id(counter: u64) -> DistributedId {
        DistributedId::new(0, counter)
    }

    #[test]
    fn triangle_has_clustering_coefficient_one() {
        let mut g: Graph<u32> = Graph::new();
        for i in 0..3 {
            g.insert_node(DistNode::new_local(id(i), i as u32, 1.0, 0))
                .unwrap();
        }
        let pairs = [(0, 1), (1, 2), (2, 0), (1, 0), (2, 1), (0, 2)];
        for (n, (src, tgt)) in pairs.iter().enumerate() {
            g.insert_edge(DistEdge::new(
                id(100 + n as u64),
                0,
                1.0,
                id(*src),
                id(*tgt),
                LocationState::Local,
            ))
            .unwrap();
        }
        assert_eq!(local_clustering_coefficient(&g, id(0)), 1.0);
    }

    #[test]
    fn star_center_has_clustering_coefficient_zero() {
        let mut g: Graph<u32> = Graph::new();
        for i in 0..4 {
            g.insert_node(DistNode::new_local(id(i), i as u32, 1.0, 0))
                .unwrap();
        }
        for leaf in 1..4 {
            g.insert_edge(DistEdge::new(
                id(100 + leaf),
                0,
                1.0,
                id(0),
                id(leaf),
                LocationState::Local,
            ))
            .unwrap();
        }
        assert_eq!(local_clustering_coefficient(&g, id(0)), 0.0);
    }

    #[test]
    fn fewer_than_two_neighbors_yields_zero() {
        let mut g: Graph<u32> = Graph::new();
        g.insert_node(DistNode::new_local(id(0), 0, 1.0, 0)).unwrap();
        assert_eq!(local_clustering_coefficient(&g, id(0)), 0.0);
    }
}
