pub mod config;
pub mod topology;
pub mod types;

pub use config::AutoscalerConfig;
pub use topology::{ShardTopology, TopologyPolicy, TOPOLOGY_REFERENCE};
pub use types::*;
