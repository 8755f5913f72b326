use bsp_louvain::config::{ExecutionMode, RunConfig};
use bsp_louvain::louvain::{DecisionPolicy, ExchangeStrategy, LouvainConfig, OutsideWeight};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// Triplet joins and group-by-key
    Join,
    /// Vertex program supersteps
    Pregel,
}

impl From<Strategy> for ExchangeStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Join => ExchangeStrategy::Join,
            Strategy::Pregel => ExchangeStrategy::Pregel,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "bsp-louvain",
    version,
    about = "Bulk-synchronous Louvain community detection over an edge list",
    allow_negative_numbers = true
)]
struct ProgramArgs {
    /// Execution mode: local, local[N] or local[*]
    mode: String,

    /// Input edge list, one `a,b` pair per line
    input: PathBuf,

    /// Number of partitions
    partitions: usize,

    /// Output file for `vertex,community` lines
    output: PathBuf,

    /// Maximum number of outer passes
    max_passes: usize,

    /// Minimum modularity change (accepted, not applied)
    min_change: f64,

    /// Local-moving rounds per pass
    max_iters: usize,

    /// Seed for the per-vertex decision streams
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// How neighbor summaries are exchanged
    #[arg(long, value_enum, default_value_t = Strategy::Join)]
    strategy: Strategy,

    /// Probability that a vertex skips its decision in a round
    #[arg(long, default_value_t = 0.8)]
    skip_probability: f64,

    /// Add up outside weights per community instead of keeping the last one seen
    #[arg(long)]
    sum_outside_weight: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ProgramArgs::parse();

    let outside_weight = if args.sum_outside_weight {
        OutsideWeight::Sum
    } else {
        OutsideWeight::LastWrite
    };
    let config = RunConfig {
        mode: ExecutionMode::parse(&args.mode),
        input: args.input,
        partitions: args.partitions,
        output: args.output,
        louvain: LouvainConfig {
            max_passes: args.max_passes,
            max_iters: args.max_iters,
            min_change: args.min_change,
            strategy: args.strategy.into(),
            policy: DecisionPolicy::new(args.skip_probability, outside_weight),
            seed: args.seed,
        },
    };
    config.execute()?;
    Ok(())
}
