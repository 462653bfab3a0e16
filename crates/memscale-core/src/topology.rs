//! Topology legality: which shard counts form a supported cluster shape.
//!
//! The set of legal shapes belongs to the managed service, so the check is
//! a trait. `ShardTopology` is the configurable default.

use std::collections::BTreeSet;

use crate::config::TopologyConfig;

/// Documentation for unsupported cluster shapes, quoted in validation errors.
pub const TOPOLOGY_REFERENCE: &str = "https://cloud.google.com/memorystore/docs/cluster/cluster-node-specification#unsupported_cluster_shape";

/// Decides whether a shard count names a structurally supported cluster.
pub trait TopologyPolicy: Send + Sync {
    fn is_supported(&self, shards: u32) -> bool;
}

impl<F> TopologyPolicy for F
where
    F: Fn(u32) -> bool + Send + Sync,
{
    fn is_supported(&self, shards: u32) -> bool {
        self(shards)
    }
}

/// Every positive shard count is legal except an explicit deny list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTopology {
    unsupported: BTreeSet<u32>,
}

impl ShardTopology {
    pub fn new(unsupported: impl IntoIterator<Item = u32>) -> Self {
        Self {
            unsupported: unsupported.into_iter().collect(),
        }
    }
}

impl Default for ShardTopology {
    fn default() -> Self {
        Self::from(&TopologyConfig::default())
    }
}

impl From<&TopologyConfig> for ShardTopology {
    fn from(config: &TopologyConfig) -> Self {
        Self::new(config.unsupported_shard_counts.iter().copied())
    }
}

impl TopologyPolicy for ShardTopology {
    fn is_supported(&self, shards: u32) -> bool {
        shards > 0 && !self.unsupported.contains(&shards)
    }
}
