pub mod config;
pub mod dataset;
pub mod graph;
pub mod louvain;
pub mod network;
pub mod pregel;

pub use dataset::Dataset;
pub use graph::{Edge, Graph, VertexId};
pub use louvain::{Louvain, LouvainConfig, LouvainOutcome};
