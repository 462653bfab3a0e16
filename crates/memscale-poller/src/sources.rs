//! Collaborator seams: cluster metadata, metric queries, publication.
//!
//! Real deployments back these with the managed-service APIs. The static
//! and channel implementations here serve the CLI and tests.

use std::collections::HashMap;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc;

use memscale_core::{ClusterId, ClusterMetadata, Envelope};

use crate::metrics::MetricSpec;

/// Fetches live metadata (current size, shard count) for a cluster.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn cluster_metadata(&self, cluster: &ClusterId) -> anyhow::Result<ClusterMetadata>;
}

/// Executes one monitoring query and returns the raw value.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn query(&self, cluster: &ClusterId, spec: &MetricSpec) -> anyhow::Result<f64>;
}

/// Delivers an opaque message to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()>;
}

// ── Static sources ─────────────────────────────────────────────────

/// Metadata keyed by the full cluster path
/// (`projects/<p>/locations/<r>/clusters/<c>`), so equal cluster ids in
/// different projects or regions stay apart.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    clusters: HashMap<String, ClusterMetadata>,
}

impl StaticMetadata {
    pub fn with_cluster(mut self, cluster: &ClusterId, metadata: ClusterMetadata) -> Self {
        self.clusters.insert(cluster.to_string(), metadata);
        self
    }

    /// Parse `{ "<cluster path>": { "currentSize": n, "shardCount": n } }`.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let clusters = serde_json::from_str(json).context("invalid cluster metadata file")?;
        Ok(Self { clusters })
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn cluster_metadata(&self, cluster: &ClusterId) -> anyhow::Result<ClusterMetadata> {
        self.clusters
            .get(&cluster.to_string())
            .copied()
            .ok_or_else(|| anyhow!("cluster {cluster} not found"))
    }
}

/// Raw metric values keyed by the full cluster path, then metric name.
#[derive(Debug, Clone, Default)]
pub struct StaticMetrics {
    clusters: HashMap<String, HashMap<String, f64>>,
}

impl StaticMetrics {
    pub fn with_metric(mut self, cluster: &ClusterId, name: &str, raw: f64) -> Self {
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .insert(name.to_string(), raw);
        self
    }

    /// Parse `{ "<cluster path>": { "<metric name>": raw value } }`.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let clusters = serde_json::from_str(json).context("invalid metrics file")?;
        Ok(Self { clusters })
    }
}

#[async_trait]
impl MetricsSource for StaticMetrics {
    async fn query(&self, cluster: &ClusterId, spec: &MetricSpec) -> anyhow::Result<f64> {
        self.clusters
            .get(&cluster.to_string())
            .and_then(|metrics| metrics.get(&spec.name))
            .copied()
            .ok_or_else(|| anyhow!("no time series for {} on {cluster}", spec.name))
    }
}

/// Publishes into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        self.tx
            .send(Envelope {
                topic: topic.to_string(),
                payload,
            })
            .await
            .map_err(|_| anyhow!("topic {topic}: receiver closed"))
    }
}
