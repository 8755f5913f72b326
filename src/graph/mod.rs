//! Partitioned property graph built on [`Dataset`].
//!
//! Edges are undirected and stored once, normalized so that `lo <= hi`. In triplets and
//! message contexts the `lo` endpoint plays the source role and `hi` the destination role.

use crate::dataset::Dataset;

pub mod io;

pub type VertexId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    lo: VertexId,
    hi: VertexId,
}

impl Edge {
    /// Builds the normalized edge `(min(a, b), max(a, b))`.
    pub fn new(a: VertexId, b: VertexId) -> Self {
        if a <= b {
            Edge { lo: a, hi: b }
        } else {
            Edge { lo: b, hi: a }
        }
    }

    #[inline]
    pub fn lo(&self) -> VertexId {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> VertexId {
        self.hi
    }

    #[inline]
    pub fn is_self_loop(&self) -> bool {
        self.lo == self.hi
    }
}

impl From<(VertexId, VertexId)> for Edge {
    fn from((a, b): (VertexId, VertexId)) -> Self {
        Edge::new(a, b)
    }
}

/// An edge together with the attributes of both endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTriplet<V> {
    pub src_id: VertexId,
    pub src_attr: V,
    pub dst_id: VertexId,
    pub dst_attr: V,
}

impl<V> EdgeTriplet<V> {
    pub fn is_self_loop(&self) -> bool {
        self.src_id == self.dst_id
    }
}

/// Per-edge handle given to message senders in [`Graph::aggregate_messages`].
pub struct EdgeContext<'a, V, M> {
    triplet: &'a EdgeTriplet<V>,
    outbox: Vec<(VertexId, M)>,
}

impl<'a, V, M> EdgeContext<'a, V, M> {
    fn new(triplet: &'a EdgeTriplet<V>) -> Self {
        EdgeContext {
            triplet,
            outbox: Vec::with_capacity(2),
        }
    }

    pub fn triplet(&self) -> &'a EdgeTriplet<V> {
        self.triplet
    }

    pub fn src_id(&self) -> VertexId {
        self.triplet.src_id
    }

    pub fn dst_id(&self) -> VertexId {
        self.triplet.dst_id
    }

    pub fn src_attr(&self) -> &'a V {
        &self.triplet.src_attr
    }

    pub fn dst_attr(&self) -> &'a V {
        &self.triplet.dst_attr
    }

    pub fn send_to_src(&mut self, message: M) {
        self.outbox.push((self.triplet.src_id, message));
    }

    pub fn send_to_dst(&mut self, message: M) {
        self.outbox.push((self.triplet.dst_id, message));
    }
}

/// Per-endpoint edge count. A self-loop counts once for each of its two endpoints.
pub fn edge_degrees(edges: &Dataset<Edge>) -> Dataset<(VertexId, i64)> {
    edges
        .flat_map(|edge| [(edge.lo(), 1i64), (edge.hi(), 1i64)])
        .reduce_by_key(|a, b| a + b)
}

#[derive(Debug, Clone)]
pub struct Graph<V> {
    vertices: Dataset<(VertexId, V)>,
    edges: Dataset<Edge>,
}

impl<V> Graph<V>
where
    V: Clone + Send + Sync,
{
    pub fn new(vertices: Dataset<(VertexId, V)>, edges: Dataset<Edge>) -> Self {
        Graph { vertices, edges }
    }

    /// The vertex set is the distinct union of edge endpoints, each with `default`.
    pub fn from_edges(edges: Dataset<Edge>, default: V) -> Self {
        let endpoints = edges.flat_map(|edge| [edge.lo(), edge.hi()]);
        let ids = endpoints.distinct();
        endpoints.unpersist();
        let vertices = ids.map(|&id| (id, default.clone()));
        Graph { vertices, edges }
    }

    pub fn vertices(&self) -> &Dataset<(VertexId, V)> {
        &self.vertices
    }

    pub fn edges(&self) -> &Dataset<Edge> {
        &self.edges
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.count()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.count()
    }

    /// Swaps in a new vertex set and hands back the old one for eviction.
    pub fn replace_vertices(&mut self, vertices: Dataset<(VertexId, V)>) -> Dataset<(VertexId, V)> {
        std::mem::replace(&mut self.vertices, vertices)
    }

    pub fn into_parts(self) -> (Dataset<(VertexId, V)>, Dataset<Edge>) {
        (self.vertices, self.edges)
    }

    pub fn degrees(&self) -> Dataset<(VertexId, i64)> {
        edge_degrees(&self.edges)
    }

    /// Joins every edge with the current attributes of both endpoints.
    pub fn triplets(&self) -> Dataset<EdgeTriplet<V>> {
        let by_src = self.edges.map(|edge| (edge.lo(), *edge));
        let with_src = by_src.join(&self.vertices);
        by_src.unpersist();

        let by_dst = with_src.map(|(_, (edge, src_attr))| (edge.hi(), (*edge, src_attr.clone())));
        with_src.unpersist();

        let full = by_dst.join(&self.vertices);
        by_dst.unpersist();

        full.map(|(_, ((edge, src_attr), dst_attr))| EdgeTriplet {
            src_id: edge.lo(),
            src_attr: src_attr.clone(),
            dst_id: edge.hi(),
            dst_attr: dst_attr.clone(),
        })
    }

    /// Runs `send` on every triplet and merges the messages addressed to each vertex.
    ///
    /// Vertices that receive nothing are absent from the result.
    pub fn aggregate_messages<M, S, R>(&self, send: S, merge: R) -> Dataset<(VertexId, M)>
    where
        M: Clone + Send + Sync,
        S: Fn(&mut EdgeContext<'_, V, M>) + Sync + Send,
        R: Fn(M, M) -> M + Sync + Send,
    {
        let triplets = self.triplets();
        let messages = triplets.flat_map(|triplet| {
            let mut ctx = EdgeContext::new(triplet);
            send(&mut ctx);
            ctx.outbox
        });
        triplets.unpersist();

        let merged = messages.reduce_by_key(merge);
        messages.unpersist();
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_edges() -> Dataset<Edge> {
        Dataset::from_vec(
            vec![
                Edge::new(2, 1),
                Edge::new(2, 3),
                Edge::new(3, 3),
                Edge::new(1, 2),
            ],
            2,
        )
    }

    #[test]
    fn test_edge_normalization() {
        let edge = Edge::new(9, 4);
        assert_eq!((edge.lo(), edge.hi()), (4, 9));
        assert_eq!(Edge::from((4, 9)), edge);
        assert!(Edge::new(5, 5).is_self_loop());
        assert!(!edge.is_self_loop());
    }

    #[test]
    fn test_from_edges_builds_vertex_union() {
        let graph = Graph::from_edges(sample_edges(), 0u8);
        let mut ids: Vec<_> = graph.vertices().keys().into_vec();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(graph.num_edges(), 4);
    }

    #[test]
    fn test_degrees_count_self_loop_twice() {
        let graph = Graph::from_edges(sample_edges(), ());
        let degrees = graph.degrees().collect_as_map();
        assert_eq!(degrees[&1], 2);
        assert_eq!(degrees[&2], 3);
        assert_eq!(degrees[&3], 3);
    }

    #[test]
    fn test_triplets_carry_endpoint_attributes() {
        let edges = Dataset::from_vec(vec![Edge::new(1, 2), Edge::new(2, 3)], 2);
        let vertices = Dataset::from_vec(vec![(1, "a"), (2, "b"), (3, "c")], 3);
        let graph = Graph::new(vertices, edges);

        let mut triplets = graph.triplets().into_vec();
        triplets.sort_by_key(|t| (t.src_id, t.dst_id));
        assert_eq!(triplets.len(), 2);
        assert_eq!((triplets[0].src_attr, triplets[0].dst_attr), ("a", "b"));
        assert_eq!((triplets[1].src_attr, triplets[1].dst_attr), ("b", "c"));
    }

    #[test]
    fn test_aggregate_messages_sums_neighbor_ids() {
        let graph = Graph::from_edges(sample_edges(), ());
        let sums = graph
            .aggregate_messages(
                |ctx: &mut EdgeContext<'_, (), i64>| {
                    if !ctx.triplet().is_self_loop() {
                        let (src, dst) = (ctx.src_id(), ctx.dst_id());
                        ctx.send_to_src(dst);
                        ctx.send_to_dst(src);
                    }
                },
                |a, b| a + b,
            )
            .collect_as_map();

        assert_eq!(sums[&1], 4);
        assert_eq!(sums[&2], 1 + 1 + 3);
        assert_eq!(sums[&3], 2);
    }

    #[test]
    fn test_replace_vertices_returns_previous() {
        let mut graph = Graph::from_edges(sample_edges(), 0i32);
        let next = graph.vertices().map_values(|v| v + 1);
        let previous = graph.replace_vertices(next);
        assert!(previous.iter().all(|(_, v)| *v == 0));
        assert!(graph.vertices().iter().all(|(_, v)| *v == 1));
    }
}
