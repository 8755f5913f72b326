// https://en.wikipedia.org/wiki/Louvain_method
use crate::dataset::Dataset;
use crate::graph::{Edge, VertexId};
use crate::louvain::coarsen::coarsen;
use ahash::AHashMap;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rayon::iter::ParallelIterator;
use rayon::slice::ParallelSlice;

/// A community and the total degree of its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunityNode {
    pub community: VertexId,
    pub degree: i64,
}

pub type QuotientGraph = UnGraph<CommunityNode, i64>;

/// Community graph collected on the driver: one node per community, one edge per community
/// pair weighted by the number of original edges between them. Internal edges become a
/// self-loop on their community.
pub struct Network {
    pub graph: QuotientGraph,
    index: AHashMap<VertexId, NodeIndex>,
}

pub struct NeighborAndWeightIterator<'a> {
    edge_iter: petgraph::graph::Edges<'a, i64, petgraph::Undirected>,
    home_node: NodeIndex,
    graph: &'a QuotientGraph,
}

impl Iterator for NeighborAndWeightIterator<'_> {
    type Item = (VertexId, i64);

    fn next(&mut self) -> Option<Self::Item> {
        self.edge_iter.next().map(|edge_ref| {
            let neighbor = if edge_ref.source() == self.home_node {
                edge_ref.target()
            } else {
                edge_ref.source()
            };
            (self.graph[neighbor].community, *edge_ref.weight())
        })
    }
}

impl Network {
    /// Collapses `edges` by `assignment`. Endpoints without a mapping fall into community `0`.
    pub fn from_assignment(edges: &Dataset<Edge>, assignment: &Dataset<(VertexId, VertexId)>) -> Self {
        let coarse = coarsen(edges, assignment);
        let weighted = coarse.map(|edge| (*edge, 1i64)).reduce_by_key(|a, b| a + b);
        coarse.unpersist();

        let mut rows = weighted.into_vec();
        rows.sort_unstable();

        let mut degrees: AHashMap<VertexId, i64> = AHashMap::new();
        for (edge, count) in &rows {
            *degrees.entry(edge.lo()).or_default() += count;
            *degrees.entry(edge.hi()).or_default() += count;
        }
        let mut communities: Vec<_> = degrees.into_iter().collect();
        communities.sort_unstable();

        let mut graph = UnGraph::with_capacity(communities.len(), rows.len());
        let mut index = AHashMap::with_capacity(communities.len());
        for (community, degree) in communities {
            index.insert(community, graph.add_node(CommunityNode { community, degree }));
        }
        for (edge, count) in rows {
            if let (Some(&a), Some(&b)) = (index.get(&edge.lo()), index.get(&edge.hi())) {
                graph.add_edge(a, b, count);
            }
        }
        Network { graph, index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Community with the largest degree; the smallest id wins ties.
    pub fn largest_community(&self) -> Option<&CommunityNode> {
        self.graph
            .node_weights()
            .max_by(|a, b| a.degree.cmp(&b.degree).then(b.community.cmp(&a.community)))
    }

    /// Neighboring communities of `community` with edge multiplicities. A community with
    /// internal edges lists itself.
    pub fn neighbors(&self, community: VertexId) -> Option<NeighborAndWeightIterator<'_>> {
        self.index.get(&community).map(|&home_node| NeighborAndWeightIterator {
            edge_iter: self.graph.edges(home_node),
            home_node,
            graph: &self.graph,
        })
    }

    /// Number of original edges.
    pub fn total_edge_weight(&self) -> i64 {
        let weights: Vec<i64> = self.graph.edge_weights().copied().collect();
        weights
            .par_chunks(256)
            .map(|chunk| chunk.iter().sum::<i64>())
            .sum()
    }

    pub fn total_degree(&self) -> i64 {
        self.graph.node_weights().map(|node| node.degree).sum()
    }

    /// Textbook modularity `sum_c (2 * internal_c / T - (degree_c / T)^2)` over every community,
    /// where `T` is the total degree.
    pub fn modularity(&self) -> f64 {
        let total = self.total_degree() as f64;
        if total == 0.0 {
            return 0.0;
        }
        self.graph
            .node_indices()
            .map(|idx| {
                let internal: i64 = self
                    .graph
                    .edges_connecting(idx, idx)
                    .map(|edge| *edge.weight())
                    .sum();
                let share = self.graph[idx].degree as f64 / total;
                2.0 * internal as f64 / total - share * share
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::louvain::modularity::modularity;
    use approx::assert_relative_eq;

    fn two_triangles() -> Dataset<Edge> {
        Dataset::from_vec(
            vec![
                Edge::new(1, 2),
                Edge::new(2, 3),
                Edge::new(3, 1),
                Edge::new(4, 5),
                Edge::new(5, 6),
                Edge::new(6, 4),
                Edge::new(3, 4),
            ],
            3,
        )
    }

    fn split() -> Dataset<(VertexId, VertexId)> {
        Dataset::from_vec(vec![(1, 1), (2, 1), (3, 1), (4, 4), (5, 4), (6, 4)], 2)
    }

    #[test]
    fn test_quotient_structure() {
        let network = Network::from_assignment(&two_triangles(), &split());
        assert_eq!(network.node_count(), 2);
        assert_eq!(network.edge_count(), 3);
        assert_eq!(network.total_edge_weight(), 7);
        assert_eq!(network.total_degree(), 14);
        assert_eq!(
            network.largest_community(),
            Some(&CommunityNode {
                community: 1,
                degree: 7
            })
        );

        let mut neighbors: Vec<_> = network.neighbors(1).unwrap().collect();
        neighbors.sort();
        assert_eq!(neighbors, vec![(1, 3), (4, 1)]);
        assert!(network.neighbors(9).is_none());
    }

    #[test]
    fn test_modularity_agrees_with_evaluator() {
        let edges = two_triangles();
        let assignment = split();
        let network = Network::from_assignment(&edges, &assignment);
        // (6/14 - 1/4) * 2
        assert_relative_eq!(network.modularity(), 5.0 / 14.0, epsilon = 1e-12);
        assert_relative_eq!(
            network.modularity(),
            modularity(&edges, &assignment),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_singletons_differ_from_evaluator() {
        let edges = two_triangles();
        let singletons = Dataset::from_vec((1..=6).map(|v| (v, v)).collect(), 2);
        let network = Network::from_assignment(&edges, &singletons);
        assert_eq!(network.node_count(), 6);
        assert!(network.modularity() < 0.0);
        assert_eq!(modularity(&edges, &singletons), 0.0);
    }

    #[test]
    fn test_empty() {
        let network = Network::from_assignment(&Dataset::empty(2), &Dataset::empty(2));
        assert_eq!(network.node_count(), 0);
        assert_eq!(network.modularity(), 0.0);
    }
}
