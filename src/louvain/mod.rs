//! Louvain community detection as bulk-synchronous rounds over partitioned data.
//!
//! A run is a sequence of outer passes. Each pass builds vertex state from the current edge
//! list, runs a fixed number of local-moving rounds (exchange, decide, aggregate), folds the
//! resulting assignment into the [`CommunityHistory`] and coarsens the edge list by community
//! for the next pass. Passes stop once no vertex ends a pass outside its own community, or
//! when the pass budget runs out.

use crate::dataset::Dataset;
use crate::graph::{Edge, VertexId};
use log::{debug, info, log_enabled, Level};

pub mod aggregate;
pub mod coarsen;
pub mod decision;
pub mod exchange;
pub mod history;
pub mod modularity;
pub mod state;

pub use decision::{get_best_community, DecisionPolicy, OutsideWeight};
pub use history::CommunityHistory;

/// Community used when a vertex has no known mapping.
pub const MISSING_COMMUNITY: VertexId = 0;

/// How neighbor summaries travel within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeStrategy {
    /// Explicit triplet joins and group-by-key.
    #[default]
    Join,
    /// A vertex program superstep.
    Pregel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LouvainConfig {
    /// Outer pass budget.
    pub max_passes: usize,
    /// Rounds per pass. Every pass runs exactly this many.
    pub max_iters: usize,
    /// Accepted for compatibility; rounds are never cut short by it.
    pub min_change: f64,
    pub strategy: ExchangeStrategy,
    pub policy: DecisionPolicy,
    pub seed: u64,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        LouvainConfig {
            max_passes: 10,
            max_iters: 10,
            min_change: 0.0,
            strategy: ExchangeStrategy::Join,
            policy: DecisionPolicy::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    pub pass: usize,
    pub vertices: usize,
    pub edges: usize,
    /// Vertices that ended the pass outside their own community.
    pub moved: usize,
    pub modularity: f64,
}

#[derive(Debug, Clone)]
pub struct LouvainOutcome {
    pub history: CommunityHistory,
    pub passes: Vec<PassSummary>,
    /// Edge list of the last coarsened graph.
    pub coarse_edges: Dataset<Edge>,
}

impl LouvainOutcome {
    pub fn assignment(&self) -> Option<&Dataset<(VertexId, VertexId)>> {
        self.history.assignment()
    }

    pub fn modularity(&self) -> Option<f64> {
        self.passes.last().map(|pass| pass.modularity)
    }
}

struct PassResult {
    assignment: Dataset<(VertexId, VertexId)>,
    edges: Dataset<Edge>,
    vertices: usize,
}

pub struct Louvain {
    config: LouvainConfig,
}

impl Louvain {
    pub fn new(config: LouvainConfig) -> Self {
        Louvain { config }
    }

    pub fn config(&self) -> &LouvainConfig {
        &self.config
    }

    pub fn run(&self, edges: &Dataset<Edge>) -> LouvainOutcome {
        info!(
            "louvain starting: {} edges in {} partitions, at most {} passes of {} rounds",
            edges.count(),
            edges.num_partitions(),
            self.config.max_passes,
            self.config.max_iters
        );
        debug!(
            "minimum modularity change {} is not applied",
            self.config.min_change
        );

        let mut history = CommunityHistory::new();
        let mut passes = Vec::new();
        let mut current = edges.clone();
        let mut previous_modularity: Option<f64> = None;

        for pass in 0..self.config.max_passes {
            let PassResult {
                assignment,
                edges: pass_edges,
                vertices,
            } = self.run_pass(pass, current);

            let moved = assignment.aggregate(
                0usize,
                |acc, (vertex, community)| acc + usize::from(vertex != community),
                |a, b| a + b,
            );
            history.update(&assignment);
            current = coarsen::coarsen(&pass_edges, &assignment);
            let edge_count = pass_edges.count();
            assignment.unpersist();
            pass_edges.unpersist();

            let modularity = history
                .assignment()
                .map_or(0.0, |assignment| modularity::modularity(edges, assignment));
            info!(
                "pass {}: {} vertices, {} edges, {} moved, modularity {:.6} (change {:+.6})",
                pass,
                vertices,
                edge_count,
                moved,
                modularity,
                modularity - previous_modularity.unwrap_or(0.0)
            );
            previous_modularity = Some(modularity);
            passes.push(PassSummary {
                pass,
                vertices,
                edges: edge_count,
                moved,
                modularity,
            });

            if moved == 0 {
                info!("louvain stabilized after {} passes", pass + 1);
                break;
            }
        }

        LouvainOutcome {
            history,
            passes,
            coarse_edges: current,
        }
    }

    fn run_pass(&self, pass: usize, edges: Dataset<Edge>) -> PassResult {
        let mut graph = state::initialize(edges);
        let total_degree = state::total_degree(&graph);

        for round in 0..self.config.max_iters {
            let ctx = decision::RoundContext::new(
                total_degree,
                self.config.policy,
                decision::DecisionStream::new(self.config.seed, pass, round),
            );
            let decided = match self.config.strategy {
                ExchangeStrategy::Join => exchange::join_round(&graph, &ctx),
                ExchangeStrategy::Pregel => exchange::pregel_round(&graph, &ctx),
            };
            let aggregated = aggregate::aggregate_communities(&decided);
            decided.unpersist();
            graph.replace_vertices(aggregated).unpersist();

            if log_enabled!(Level::Debug) {
                let communities = graph.vertices().map(|(_, record)| record.community).distinct();
                debug!(
                    "pass {} round {}: {} communities",
                    pass,
                    round,
                    communities.count()
                );
            }
        }

        let assignment = graph.vertices().map(|(id, record)| (*id, record.community));
        let vertices = graph.num_vertices();
        let (vertex_set, edges) = graph.into_parts();
        vertex_set.unpersist();
        PassResult {
            assignment,
            edges,
            vertices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::{HashMap, HashSet};

    fn dataset(pairs: &[(VertexId, VertexId)], partitions: usize) -> Dataset<Edge> {
        Dataset::from_vec(pairs.iter().map(|&p| Edge::from(p)).collect(), partitions)
    }

    fn two_triangles() -> Dataset<Edge> {
        dataset(&[(1, 2), (2, 3), (3, 1), (4, 5), (5, 6), (6, 4)], 3)
    }

    fn groups(outcome: &LouvainOutcome) -> Vec<Vec<VertexId>> {
        let mut by_community: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
        for (vertex, community) in outcome.assignment().unwrap().iter() {
            by_community.entry(*community).or_default().push(*vertex);
        }
        let mut groups: Vec<Vec<VertexId>> = by_community
            .into_values()
            .map(|mut members| {
                members.sort();
                members
            })
            .collect();
        groups.sort();
        groups
    }

    fn config(max_passes: usize, max_iters: usize, seed: u64) -> LouvainConfig {
        LouvainConfig {
            max_passes,
            max_iters,
            seed,
            ..LouvainConfig::default()
        }
    }

    #[test]
    fn test_zero_passes_accumulates_nothing() {
        let outcome = Louvain::new(config(0, 5, 1)).run(&two_triangles());
        assert!(outcome.history.is_empty());
        assert!(outcome.passes.is_empty());
        assert_eq!(outcome.modularity(), None);
    }

    #[test]
    fn test_zero_rounds_stops_after_one_pass() {
        let outcome = Louvain::new(config(5, 0, 1)).run(&two_triangles());
        assert_eq!(outcome.passes.len(), 1);
        assert_eq!(outcome.passes[0].moved, 0);
        assert_eq!(outcome.history.passes(), 1);
        for (vertex, community) in outcome.assignment().unwrap().iter() {
            assert_eq!(vertex, community);
        }
        assert_eq!(outcome.modularity(), Some(0.0));
    }

    #[test]
    fn test_never_evaluate_is_a_fixed_point() {
        let cfg = LouvainConfig {
            policy: DecisionPolicy::never_evaluate(),
            ..config(5, 5, 1)
        };
        let edges = two_triangles();
        let outcome = Louvain::new(cfg).run(&edges);
        assert_eq!(outcome.passes.len(), 1);
        let mut coarse = outcome.coarse_edges.into_vec();
        let mut original = edges.into_vec();
        coarse.sort();
        original.sort();
        assert_eq!(coarse, original);
    }

    #[test]
    fn test_terminates_within_pass_budget() {
        let pairs: Vec<(VertexId, VertexId)> = (0..60i64)
            .flat_map(|i| [(i, (i + 1) % 60), (i, (i * 13 + 5) % 60)])
            .collect();
        for max_passes in 0..4 {
            let outcome = Louvain::new(config(max_passes, 3, 11)).run(&dataset(&pairs, 4));
            assert!(outcome.passes.len() <= max_passes);
            assert_eq!(outcome.history.passes(), outcome.passes.len());
        }
    }

    #[test]
    fn test_communities_never_span_disconnected_triangles() {
        for seed in 0..16 {
            let outcome = Louvain::new(config(5, 5, seed)).run(&two_triangles());
            let assignment = outcome.assignment().unwrap().collect_as_map();
            assert_eq!(assignment.len(), 6);
            let left: HashSet<_> = [1, 2, 3].iter().map(|v| assignment[v]).collect();
            let right: HashSet<_> = [4, 5, 6].iter().map(|v| assignment[v]).collect();
            assert!(left.is_disjoint(&right), "seed {}", seed);
            assert!(outcome.passes.len() <= 5);
        }
    }

    #[test]
    fn test_two_triangles_converge_to_two_communities() {
        let expected = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let mut converged = 0;
        for seed in 0..100u64 {
            let outcome = Louvain::new(config(10, 10, seed)).run(&two_triangles());
            // Every vertex has neighbors, so 60 skip draws would all have to hit.
            assert!(
                outcome.passes[0].moved > 0,
                "seed {} froze in the first pass",
                seed
            );
            if groups(&outcome) == expected {
                assert_relative_eq!(outcome.modularity().unwrap(), 0.5, epsilon = 1e-12);
                converged += 1;
            }
        }
        assert!(converged >= 90, "only {} of 100 seeds converged", converged);
    }

    #[test]
    fn test_same_seed_reproduces_run() {
        let first = Louvain::new(config(5, 5, 77)).run(&two_triangles());
        let second = Louvain::new(config(5, 5, 77)).run(&two_triangles());
        assert_eq!(groups(&first), groups(&second));
        assert_eq!(first.passes, second.passes);
    }

    #[test]
    fn test_join_and_pregel_strategies_agree() {
        let pairs: Vec<(VertexId, VertexId)> = (0..40i64)
            .flat_map(|i| [(i, (i + 1) % 40), (i, (i * 7 + 2) % 40), (i, i)])
            .collect();
        let join = LouvainConfig {
            strategy: ExchangeStrategy::Join,
            ..config(4, 4, 5)
        };
        let pregel = LouvainConfig {
            strategy: ExchangeStrategy::Pregel,
            ..join.clone()
        };
        let a = Louvain::new(join).run(&dataset(&pairs, 3));
        let b = Louvain::new(pregel).run(&dataset(&pairs, 3));
        assert_eq!(
            a.assignment().unwrap().collect_as_map(),
            b.assignment().unwrap().collect_as_map()
        );
        assert_eq!(a.passes, b.passes);
    }

    #[test]
    fn test_single_edge_single_round() {
        let outcome = Louvain::new(LouvainConfig {
            policy: DecisionPolicy::always_evaluate(),
            ..config(1, 1, 3)
        })
        .run(&dataset(&[(1, 2)], 1));
        let assignment = outcome.assignment().unwrap().collect_as_map();
        // Both endpoints evaluate simultaneously and swap communities.
        assert_eq!(assignment[&1], 2);
        assert_eq!(assignment[&2], 1);
        assert_eq!(outcome.passes[0].moved, 2);
    }
}
