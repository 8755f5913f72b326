use crate::dataset::Dataset;
use crate::graph::{Edge, Graph, VertexId};

/// One neighbor message as observed on one edge triplet.
///
/// Carries the receiving vertex's own state next to the sending neighbor's state, both read
/// from the same start-of-round snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborSummary {
    pub degree: i64,
    pub community: VertexId,
    pub community_weight: i64,
    pub neigh_degree: i64,
    pub neigh_community: VertexId,
    pub neigh_community_weight: i64,
}

impl NeighborSummary {
    pub fn observe(own: &VertexRecord, neighbor: &VertexRecord) -> Self {
        NeighborSummary {
            degree: own.degree,
            community: own.community,
            community_weight: own.community_weight,
            neigh_degree: neighbor.degree,
            neigh_community: neighbor.community,
            neigh_community_weight: neighbor.community_weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexRecord {
    pub id: VertexId,
    pub degree: i64,
    pub self_loops: i64,
    pub community: VertexId,
    /// Degree mass of `community` as of the last aggregation.
    pub community_weight: i64,
    /// Messages received in the current round; cleared by the aggregator.
    pub neighbors: Vec<NeighborSummary>,
}

impl VertexRecord {
    /// A vertex alone in its own community.
    pub fn new(id: VertexId, degree: i64, self_loops: i64) -> Self {
        VertexRecord {
            id,
            degree,
            self_loops,
            community: id,
            community_weight: degree,
            neighbors: Vec::new(),
        }
    }
}

/// Counts self-loops per vertex in two scans: the source side of an edge contributes 1 when
/// the edge is a self-loop, the destination side always contributes 0.
pub fn self_loop_counts(edges: &Dataset<Edge>) -> Dataset<(VertexId, i64)> {
    edges
        .flat_map(|edge| {
            [
                (edge.lo(), i64::from(edge.is_self_loop())),
                (edge.hi(), 0i64),
            ]
        })
        .reduce_by_key(|a, b| a + b)
}

/// Builds the per-pass vertex state from the pass's edge list.
pub fn initialize(edges: Dataset<Edge>) -> Graph<VertexRecord> {
    let skeleton = Graph::from_edges(edges, ());
    let degrees = skeleton.degrees();
    let self_loops = self_loop_counts(skeleton.edges());

    let with_degree = skeleton
        .vertices()
        .left_outer_join(&degrees)
        .map(|(id, (_, degree))| (*id, degree.unwrap_or(0)));
    degrees.unpersist();

    let vertices = with_degree
        .left_outer_join(&self_loops)
        .map(|(id, (degree, loops))| (*id, VertexRecord::new(*id, *degree, loops.unwrap_or(0))));
    with_degree.unpersist();
    self_loops.unpersist();

    let (skeleton_vertices, edges) = skeleton.into_parts();
    skeleton_vertices.unpersist();
    Graph::new(vertices, edges)
}

/// Sum of all vertex degrees; twice the edge count.
pub fn total_degree(graph: &Graph<VertexRecord>) -> i64 {
    graph
        .vertices()
        .aggregate(0i64, |acc, (_, record)| acc + record.degree, |a, b| a + b)
}
