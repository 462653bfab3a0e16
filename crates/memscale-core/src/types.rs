//! Shared types used across memscale crates.
//!
//! Field names are serialized in camelCase: the poller payload, the
//! published cluster state and the metadata snapshot all share the
//! same wire names.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Capacity unit for a cluster. Sizing is always expressed in shards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    #[default]
    #[serde(rename = "SHARDS")]
    Shards,
}

impl Units {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Units::Shards => "SHARDS",
        }
    }
}

/// Which family of rules is evaluated for a cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalingProfile {
    Cpu,
    Memory,
    #[default]
    CpuAndMemory,
}

impl ScalingProfile {
    pub const ALL: [ScalingProfile; 3] = [
        ScalingProfile::Cpu,
        ScalingProfile::Memory,
        ScalingProfile::CpuAndMemory,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ScalingProfile::Cpu => "CPU",
            ScalingProfile::Memory => "MEMORY",
            ScalingProfile::CpuAndMemory => "CPU_AND_MEMORY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for ScalingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified identity of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterId {
    pub project_id: String,
    pub region_id: String,
    pub cluster_id: String,
}

impl ClusterId {
    pub fn new(
        project_id: impl Into<String>,
        region_id: impl Into<String>,
        cluster_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            region_id: region_id.into(),
            cluster_id: cluster_id.into(),
        }
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/clusters/{}",
            self.project_id, self.region_id, self.cluster_id
        )
    }
}

// ── Poller input ───────────────────────────────────────────────────

/// One element of the poller payload, as written by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    pub project_id: String,
    pub region_id: String,
    pub cluster_id: String,
    /// Absent means the default unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    /// Topic the enriched config is published to.
    pub scaler_pub_sub_topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_free_memory_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_profile: Option<ScalingProfile>,
}

impl ClusterRequest {
    pub fn cluster(&self) -> ClusterId {
        ClusterId::new(&self.project_id, &self.region_id, &self.cluster_id)
    }
}

/// Live metadata from the cluster-management API. Fetched every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Current size in shards.
    pub current_size: u32,
    pub shard_count: u32,
}

// ── Enriched config ────────────────────────────────────────────────

/// A validated request with defaults and live metadata merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedConfig {
    pub project_id: String,
    pub region_id: String,
    pub cluster_id: String,
    pub units: Units,
    pub scaler_pub_sub_topic: String,
    pub min_size: u32,
    pub max_size: u32,
    pub step_size: u32,
    pub min_free_memory_percent: f64,
    pub scaling_profile: ScalingProfile,
    pub current_size: u32,
    pub shard_count: u32,
}

impl EnrichedConfig {
    pub fn cluster(&self) -> ClusterId {
        ClusterId::new(&self.project_id, &self.region_id, &self.cluster_id)
    }
}

// ── Metrics ────────────────────────────────────────────────────────

pub const CPU_MAXIMUM_UTILIZATION: &str = "cpu_maximum_utilization";
pub const CPU_AVERAGE_UTILIZATION: &str = "cpu_average_utilization";
pub const MEMORY_MAXIMUM_UTILIZATION: &str = "memory_maximum_utilization";
pub const MEMORY_AVERAGE_UTILIZATION: &str = "memory_average_utilization";
pub const MAXIMUM_EVICTED_KEYS: &str = "maximum_evicted_keys";
pub const AVERAGE_EVICTED_KEYS: &str = "average_evicted_keys";

/// Metric values for one cluster, keyed by metric name.
///
/// Utilization metrics are percentages (0-100). A metric whose query
/// failed is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsSnapshot(BTreeMap<String, f64>);

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// The message the poller publishes for the scaler: the enriched
/// config with the metrics collected this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(flatten)]
    pub config: EnrichedConfig,
    pub metrics: MetricsSnapshot,
}

/// A serialized message bound for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub topic: String,
    pub payload: Vec<u8>,
}
