use super::state::VertexRecord;
use crate::dataset::Dataset;
use crate::graph::VertexId;

/// Total degree per community under the current assignment.
pub fn community_weights(vertices: &Dataset<(VertexId, VertexRecord)>) -> Dataset<(VertexId, i64)> {
    vertices
        .map(|(_, record)| (record.community, record.degree))
        .reduce_by_key(|a, b| a + b)
}

/// Recomputes every community weight from the full assignment and hands it back to the
/// members. Clears the round's neighbor summaries.
pub fn aggregate_communities(
    decided: &Dataset<(VertexId, VertexRecord)>,
) -> Dataset<(VertexId, VertexRecord)> {
    let weights = community_weights(decided);
    let by_community = decided.map(|(id, record)| (record.community, (*id, record.clone())));
    let joined = by_community.join(&weights);
    by_community.unpersist();
    weights.unpersist();

    joined.map(|(community, ((id, record), weight))| {
        (
            *id,
            VertexRecord {
                community: *community,
                community_weight: *weight,
                neighbors: Vec::new(),
                ..record.clone()
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::louvain::decision::{DecisionPolicy, DecisionStream, RoundContext};
    use crate::louvain::exchange::join_round;
    use crate::louvain::state::{initialize, total_degree};
    use std::collections::HashMap;

    #[test]
    fn test_weights_follow_assignment() {
        let mut a = VertexRecord::new(1, 3, 0);
        let mut b = VertexRecord::new(2, 5, 1);
        let c = VertexRecord::new(3, 2, 0);
        a.community = 3;
        b.community = 3;
        let decided = Dataset::from_vec(vec![(1, a), (2, b), (3, c)], 2);

        let aggregated = aggregate_communities(&decided).collect_as_map();
        assert_eq!(aggregated.len(), 3);
        for record in aggregated.values() {
            assert_eq!(record.community, 3);
            assert_eq!(record.community_weight, 10);
        }
        assert_eq!(aggregated[&2].self_loops, 1);
    }

    #[test]
    fn test_aggregation_consistency_after_round() {
        let edges = Dataset::from_vec(
            (0..30i64).map(|i| Edge::new(i, (i * 7 + 3) % 30)).collect(),
            4,
        );
        let graph = initialize(edges);
        let ctx = RoundContext::new(
            total_degree(&graph),
            DecisionPolicy::always_evaluate(),
            DecisionStream::new(3, 0, 0),
        );
        let decided = join_round(&graph, &ctx);
        let aggregated = aggregate_communities(&decided);

        let mut expected: HashMap<VertexId, i64> = HashMap::new();
        for (_, record) in aggregated.iter() {
            *expected.entry(record.community).or_default() += record.degree;
        }
        for (_, record) in aggregated.iter() {
            assert_eq!(record.community_weight, expected[&record.community]);
            assert!(record.neighbors.is_empty());
        }
        assert_eq!(aggregated.count(), graph.num_vertices());
    }
}
