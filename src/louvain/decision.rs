use super::state::{NeighborSummary, VertexRecord};
use crate::graph::VertexId;
use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const DEFAULT_SKIP_PROBABILITY: f64 = 0.8;

/// Community returned for a vertex with no neighbor summaries.
pub const EMPTY_NEIGHBORHOOD_COMMUNITY: VertexId = 0;

/// How repeated summaries for one community combine into its outside weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutsideWeight {
    /// The last summary seen for a community wins.
    #[default]
    LastWrite,
    /// Weights of all summaries for a community are added up.
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    skip_probability: f64,
    outside_weight: OutsideWeight,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy {
            skip_probability: DEFAULT_SKIP_PROBABILITY,
            outside_weight: OutsideWeight::LastWrite,
        }
    }
}

impl DecisionPolicy {
    /// Out-of-range probabilities are clamped to `[0, 1]`; NaN falls back to the default.
    pub fn new(skip_probability: f64, outside_weight: OutsideWeight) -> Self {
        let skip_probability = if skip_probability.is_nan() {
            DEFAULT_SKIP_PROBABILITY
        } else {
            skip_probability.clamp(0.0, 1.0)
        };
        DecisionPolicy {
            skip_probability,
            outside_weight,
        }
    }

    /// Always computes gains.
    pub fn always_evaluate() -> Self {
        DecisionPolicy::new(0.0, OutsideWeight::LastWrite)
    }

    /// Never computes gains; every vertex keeps its community.
    pub fn never_evaluate() -> Self {
        DecisionPolicy::new(1.0, OutsideWeight::LastWrite)
    }

    pub fn with_outside_weight(mut self, outside_weight: OutsideWeight) -> Self {
        self.outside_weight = outside_weight;
        self
    }

    pub fn skip_probability(&self) -> f64 {
        self.skip_probability
    }

    pub fn outside_weight(&self) -> OutsideWeight {
        self.outside_weight
    }
}

struct Tally {
    community: VertexId,
    inside: i64,
    outside: i64,
}

/// Picks the community a vertex should belong to after this round.
///
/// The vertex's own degree and original community are read from the first summary. With
/// probability `policy.skip_probability()` the original community is returned without
/// looking at the neighbors. Otherwise every neighboring community `c` scores
/// `inside(c) - degree * outside(c) / total_degree`, where `inside(c)` counts summaries from
/// `c` and `outside(c)` is its reported weight (minus the vertex's own degree for the
/// original community). A candidate must beat the best gain so far strictly, starting from
/// the original community at gain `0`; candidates are visited in first-seen order.
pub fn get_best_community<R: Rng>(
    summaries: &[NeighborSummary],
    total_degree: i64,
    policy: &DecisionPolicy,
    rng: &mut R,
) -> VertexId {
    let Some(own) = summaries.first() else {
        return EMPTY_NEIGHBORHOOD_COMMUNITY;
    };
    let original = own.community;

    if rng.random_bool(policy.skip_probability) || total_degree <= 0 {
        return original;
    }

    let mut index: AHashMap<VertexId, usize> = AHashMap::with_capacity(summaries.len());
    let mut tallies: Vec<Tally> = Vec::with_capacity(summaries.len());
    for summary in summaries {
        match index.get(&summary.neigh_community) {
            Some(&slot) => {
                let tally = &mut tallies[slot];
                tally.inside += 1;
                tally.outside = match policy.outside_weight {
                    OutsideWeight::LastWrite => summary.neigh_community_weight,
                    OutsideWeight::Sum => tally.outside + summary.neigh_community_weight,
                };
            }
            None => {
                index.insert(summary.neigh_community, tallies.len());
                tallies.push(Tally {
                    community: summary.neigh_community,
                    inside: 1,
                    outside: summary.neigh_community_weight,
                });
            }
        }
    }

    if let Some(&slot) = index.get(&original) {
        tallies[slot].outside -= own.degree;
    }

    let degree = own.degree as f64;
    let total = total_degree as f64;
    let mut best_community = original;
    let mut max_gain = 0.0;
    for tally in &tallies {
        let gain = tally.inside as f64 - degree * tally.outside as f64 / total;
        if gain > max_gain {
            best_community = tally.community;
            max_gain = gain;
        }
    }
    best_community
}

/// Seeds one decision RNG per `(seed, pass, round, vertex)`.
///
/// The four fields are laid out as the 32-byte ChaCha key, so every round of every pass
/// draws a fresh stream. Draws depend neither on partitioning nor on the exchange strategy,
/// so a fixed seed reproduces a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionStream {
    seed: u64,
    pass: u64,
    round: u64,
}

impl DecisionStream {
    pub fn new(seed: u64, pass: usize, round: usize) -> Self {
        DecisionStream {
            seed,
            pass: pass as u64,
            round: round as u64,
        }
    }

    pub fn rng_for(&self, vertex: VertexId) -> ChaCha8Rng {
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&self.seed.to_le_bytes());
        key[8..16].copy_from_slice(&self.pass.to_le_bytes());
        key[16..24].copy_from_slice(&self.round.to_le_bytes());
        key[24..].copy_from_slice(&vertex.to_le_bytes());
        ChaCha8Rng::from_seed(key)
    }
}

/// Everything a vertex needs to decide within one round.
#[derive(Debug, Clone)]
pub struct RoundContext {
    pub total_degree: i64,
    pub policy: DecisionPolicy,
    pub stream: DecisionStream,
}

impl RoundContext {
    pub fn new(total_degree: i64, policy: DecisionPolicy, stream: DecisionStream) -> Self {
        RoundContext {
            total_degree,
            policy,
            stream,
        }
    }

    /// Stores the round's summaries and the chosen community. Vertices that heard from no
    /// neighbor keep their community.
    pub fn decide(&self, record: &VertexRecord, summaries: Vec<NeighborSummary>) -> VertexRecord {
        let community = if summaries.is_empty() {
            record.community
        } else {
            get_best_community(
                &summaries,
                self.total_degree,
                &self.policy,
                &mut self.stream.rng_for(record.id),
            )
        };
        VertexRecord {
            community,
            neighbors: summaries,
            ..record.clone()
        }
    }
}
