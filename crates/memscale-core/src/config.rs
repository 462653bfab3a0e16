//! memscale.toml configuration parser.
//!
//! Holds the defaults merged into every cluster request and the
//! topology rules used to decide which shard counts are legal. Every
//! field is optional in the file; missing values take the built-in
//! defaults.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::types::ScalingProfile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalerConfig {
    pub defaults: Defaults,
    pub topology: TopologyConfig,
}

/// Values merged into a request when the operator leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub step_size: u32,
    pub min_free_memory_percent: f64,
    pub min_size: u32,
    /// Raised to the live shard count when the cluster is already larger.
    pub max_size: u32,
    pub scaling_profile: ScalingProfile,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            step_size: 1,
            min_free_memory_percent: 30.0,
            min_size: 3,
            max_size: 10,
            scaling_profile: ScalingProfile::CpuAndMemory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Smallest cluster the service accepts.
    pub min_cluster_size: u32,
    /// Shard counts the service rejects as a cluster shape.
    pub unsupported_shard_counts: Vec<u32>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            unsupported_shard_counts: vec![4],
        }
    }
}

impl AutoscalerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AutoscalerConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
