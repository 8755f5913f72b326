use super::MISSING_COMMUNITY;
use crate::dataset::Dataset;
use crate::graph::{Edge, VertexId};

/// Replaces both endpoints of every edge by their community.
///
/// Endpoints without a mapping land in [`MISSING_COMMUNITY`]. Edges inside one community
/// become self-loops and parallel edges are kept, so the next pass's degrees and self-loop
/// counts merge the members.
pub fn coarsen(edges: &Dataset<Edge>, assignment: &Dataset<(VertexId, VertexId)>) -> Dataset<Edge> {
    let by_lo = edges.map(|edge| (edge.lo(), edge.hi()));
    let by_hi = by_lo
        .left_outer_join(assignment)
        .map(|(_, (hi, community))| (*hi, community.unwrap_or(MISSING_COMMUNITY)));
    by_lo.unpersist();

    let coarse = by_hi
        .left_outer_join(assignment)
        .map(|(_, (lo_community, community))| {
            Edge::new(*lo_community, community.unwrap_or(MISSING_COMMUNITY))
        });
    by_hi.unpersist();
    coarse
}
