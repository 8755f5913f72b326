use super::coarsen::coarsen;
use super::MISSING_COMMUNITY;
use crate::dataset::Dataset;
use crate::graph::{edge_degrees, Edge, VertexId};

/// Modularity of `assignment` over the original `edges`, recomputed from scratch.
///
/// Each community with at least one internal edge contributes
/// `(internal_weight - degree_c^2 / T) / T`, where `internal_weight` counts every internal
/// edge in both directions and `T` is the total degree. Communities without internal edges
/// contribute nothing, so an assignment with no internal edge scores exactly `0.0`.
pub fn modularity(edges: &Dataset<Edge>, assignment: &Dataset<(VertexId, VertexId)>) -> f64 {
    let degrees = edge_degrees(edges);
    let total_degree = degrees.aggregate(0i64, |acc, (_, degree)| acc + degree, |a, b| a + b);
    if total_degree == 0 {
        return 0.0;
    }

    let labeled = coarsen(edges, assignment);
    let multiplicity = labeled.map(|edge| (*edge, 1i64)).reduce_by_key(|a, b| a + b);
    labeled.unpersist();
    let internal = multiplicity.flat_map(|(edge, count)| {
        edge.is_self_loop().then_some((edge.lo(), 2 * count))
    });
    multiplicity.unpersist();

    let degree_products = degrees
        .left_outer_join(assignment)
        .map(|(_, (degree, community))| (community.unwrap_or(MISSING_COMMUNITY), *degree))
        .reduce_by_key(|a, b| a + b)
        .map_values(|&degree| (degree as f64) * (degree as f64));
    degrees.unpersist();

    let total = total_degree as f64;
    internal.join(&degree_products).aggregate(
        0.0f64,
        |acc, (_, (weight, product))| acc + (*weight as f64 - product / total) / total,
        |a, b| a + b,
    )
}
