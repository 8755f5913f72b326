use crate::graph::io::{read_edge_list, write_assignment};
use crate::louvain::{Louvain, LouvainConfig, LouvainOutcome};
use crate::network::Network;
use anyhow::{anyhow, Context};
use log::{info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::path::PathBuf;

/// Where partitions are processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// `local[N]`; `local` means one thread.
    Local(usize),
    /// `local[*]`, all cores.
    LocalAll,
    /// Anything else. Runs on the global pool.
    Other(String),
}

impl ExecutionMode {
    pub fn parse(mode: &str) -> Self {
        let mode = mode.trim();
        if mode == "local" {
            return ExecutionMode::Local(1);
        }
        let threads = mode
            .strip_prefix("local[")
            .and_then(|rest| rest.strip_suffix(']'));
        match threads {
            Some("*") => ExecutionMode::LocalAll,
            Some(n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => ExecutionMode::Local(n),
                _ => ExecutionMode::Other(mode.to_string()),
            },
            None => ExecutionMode::Other(mode.to_string()),
        }
    }

    /// A dedicated pool for local modes, `None` when the global pool should be used.
    pub fn thread_pool(&self) -> anyhow::Result<Option<ThreadPool>> {
        let builder = match self {
            ExecutionMode::Local(threads) => ThreadPoolBuilder::new().num_threads(*threads),
            ExecutionMode::LocalAll => ThreadPoolBuilder::new(),
            ExecutionMode::Other(mode) => {
                warn!("unrecognized execution mode {:?}, using the default thread pool", mode);
                return Ok(None);
            }
        };
        builder
            .thread_name(|i| format!("louvain-worker-{}", i))
            .build()
            .map(Some)
            .map_err(|e| anyhow!("Failed to build thread pool: {}", e))
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local(1) => write!(f, "local"),
            ExecutionMode::Local(n) => write!(f, "local[{}]", n),
            ExecutionMode::LocalAll => write!(f, "local[*]"),
            ExecutionMode::Other(mode) => write!(f, "{}", mode),
        }
    }
}

/// Everything one end-to-end run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: ExecutionMode,
    pub input: PathBuf,
    pub partitions: usize,
    pub output: PathBuf,
    pub louvain: LouvainConfig,
}

impl RunConfig {
    /// Loads the edge list, runs Louvain and writes the final assignment.
    pub fn execute(&self) -> anyhow::Result<LouvainOutcome> {
        info!(
            "running in {} mode with {} partitions on {}",
            self.mode,
            self.partitions,
            self.input.display()
        );
        match self.mode.thread_pool()? {
            Some(pool) => pool.install(|| self.execute_in_pool()),
            None => self.execute_in_pool(),
        }
    }

    fn execute_in_pool(&self) -> anyhow::Result<LouvainOutcome> {
        let edges = read_edge_list(&self.input, self.partitions.max(1))?;
        let outcome = Louvain::new(self.louvain.clone()).run(&edges);

        match outcome.assignment() {
            Some(assignment) => {
                write_assignment(&self.output, assignment).with_context(|| {
                    format!("Failed to save communities for {}", self.input.display())
                })?;
                let network = Network::from_assignment(&edges, assignment);
                info!(
                    "wrote {} vertices in {} communities to {}, quotient modularity {:.6}",
                    assignment.count(),
                    network.node_count(),
                    self.output.display(),
                    network.modularity()
                );
                if let Some(report) = largest_community_report(&network) {
                    info!("{}", report);
                }
            }
            None => warn!("no pass completed, nothing written to {}", self.output.display()),
        }
        Ok(outcome)
    }
}

/// Describes the largest community of `network`: its degree, the original edges inside it
/// and the edges leaving it.
fn largest_community_report(network: &Network) -> Option<String> {
    let largest = network.largest_community()?;
    let (internal, external, neighbors) = network.neighbors(largest.community)?.fold(
        (0i64, 0i64, 0usize),
        |(internal, external, neighbors), (community, weight)| {
            if community == largest.community {
                (internal + weight, external, neighbors)
            } else {
                (internal, external + weight, neighbors + 1)
            }
        },
    );
    Some(format!(
        "largest community {}: degree {}, {} internal and {} outgoing of {} edges, {} neighboring communities",
        largest.community,
        largest.degree,
        internal,
        external,
        network.total_edge_weight(),
        neighbors
    ))
}
