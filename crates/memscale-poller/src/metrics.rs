//! Monitoring query specs for one cluster.
//!
//! `build_metrics()` describes the six time series the scaling rules
//! consume. `collect_snapshot()` runs them through a `MetricsSource` and
//! folds the results into a `MetricsSnapshot`.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use memscale_core::{
    AVERAGE_EVICTED_KEYS, CPU_AVERAGE_UTILIZATION, CPU_MAXIMUM_UTILIZATION, ClusterId,
    MAXIMUM_EVICTED_KEYS, MEMORY_AVERAGE_UTILIZATION, MEMORY_MAXIMUM_UTILIZATION,
    MetricsSnapshot,
};

use crate::sources::MetricsSource;

const METRIC_TYPE_PREFIX: &str = "redis.googleapis.com/cluster";
const RESOURCE_TYPE: &str = "redis.googleapis.com/Cluster";

/// Alignment window for every query, in seconds.
pub const ALIGNMENT_PERIOD_SECS: u64 = 60;

/// Cross-series reducer applied by the monitoring backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reducer {
    ReduceMax,
    ReduceMean,
}

/// Per-series aligner applied over the alignment period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aligner {
    AlignMax,
    AlignMean,
}

/// A monitoring query scoped to exactly one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    /// Key the value is stored under in the snapshot.
    pub name: String,
    pub filter: String,
    pub reducer: Reducer,
    pub aligner: Aligner,
    pub period: u64,
    /// Applied to the raw value (fractions become percentages).
    pub multiplier: f64,
}

struct MetricDefinition {
    name: &'static str,
    metric_type: &'static str,
    reducer: Reducer,
    aligner: Aligner,
    multiplier: f64,
}

const DEFINITIONS: [MetricDefinition; 6] = [
    MetricDefinition {
        name: CPU_MAXIMUM_UTILIZATION,
        metric_type: "cpu/maximum_utilization",
        reducer: Reducer::ReduceMax,
        aligner: Aligner::AlignMax,
        multiplier: 100.0,
    },
    MetricDefinition {
        name: CPU_AVERAGE_UTILIZATION,
        metric_type: "cpu/average_utilization",
        reducer: Reducer::ReduceMean,
        aligner: Aligner::AlignMean,
        multiplier: 100.0,
    },
    MetricDefinition {
        name: MEMORY_MAXIMUM_UTILIZATION,
        metric_type: "memory/maximum_utilization",
        reducer: Reducer::ReduceMax,
        aligner: Aligner::AlignMax,
        multiplier: 100.0,
    },
    MetricDefinition {
        name: MEMORY_AVERAGE_UTILIZATION,
        metric_type: "memory/average_utilization",
        reducer: Reducer::ReduceMean,
        aligner: Aligner::AlignMean,
        multiplier: 100.0,
    },
    MetricDefinition {
        name: MAXIMUM_EVICTED_KEYS,
        metric_type: "stats/maximum_evicted_keys",
        reducer: Reducer::ReduceMax,
        aligner: Aligner::AlignMax,
        multiplier: 1.0,
    },
    MetricDefinition {
        name: AVERAGE_EVICTED_KEYS,
        metric_type: "stats/average_evicted_keys",
        reducer: Reducer::ReduceMean,
        aligner: Aligner::AlignMean,
        multiplier: 1.0,
    },
];

/// Build the query specs for one cluster. Always returns six specs.
///
/// Identifiers are embedded verbatim; every filter names the project,
/// the region and the cluster.
pub fn build_metrics(project_id: &str, region_id: &str, cluster_id: &str) -> Vec<MetricSpec> {
    DEFINITIONS
        .iter()
        .map(|def| MetricSpec {
            name: def.name.to_string(),
            filter: format!(
                "resource.type=\"{RESOURCE_TYPE}\" AND \
                 resource.labels.project_id=\"{project_id}\" AND \
                 resource.labels.location=\"{region_id}\" AND \
                 resource.labels.cluster_id=\"{cluster_id}\" AND \
                 metric.type=\"{METRIC_TYPE_PREFIX}/{}\"",
                def.metric_type
            ),
            reducer: def.reducer,
            aligner: def.aligner,
            period: ALIGNMENT_PERIOD_SECS,
            multiplier: def.multiplier,
        })
        .collect()
}

/// Run every spec through the metrics source.
///
/// A failed query is logged and its metric left out of the snapshot; the
/// rules that need it then count as not triggered.
pub async fn collect_snapshot(
    source: &dyn MetricsSource,
    cluster: &ClusterId,
    specs: &[MetricSpec],
) -> MetricsSnapshot {
    let results = join_all(specs.iter().map(|spec| source.query(cluster, spec))).await;

    let mut snapshot = MetricsSnapshot::new();
    for (spec, result) in specs.iter().zip(results) {
        match result {
            Ok(raw) => snapshot.insert(spec.name.clone(), raw * spec.multiplier),
            Err(e) => warn!(
                %cluster,
                metric = %spec.name,
                error = %e,
                "metric query failed"
            ),
        }
    }

    debug!(%cluster, collected = snapshot.len(), requested = specs.len(), "metrics collected");
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticMetrics;

    fn cluster() -> ClusterId {
        ClusterId::new("fakeProjectId", "fakeRegionId", "fakeClusterId")
    }

    #[test]
    fn builds_six_metrics() {
        let specs = build_metrics("fakeProjectId", "fakeRegionId", "fakeClusterId");
        assert_eq!(specs.len(), 6);
    }

    #[test]
    fn every_filter_embeds_identity() {
        for spec in build_metrics("fakeProjectId", "fakeRegionId", "fakeClusterId") {
            assert!(spec.filter.contains("fakeProjectId"), "{}", spec.filter);
            assert!(spec.filter.contains("fakeRegionId"), "{}", spec.filter);
            assert!(spec.filter.contains("fakeClusterId"), "{}", spec.filter);
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let specs = build_metrics("p", "r", "c");
        let mut names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&MEMORY_AVERAGE_UTILIZATION));
    }

    #[test]
    fn filter_targets_metric_type() {
        let specs = build_metrics("p", "r", "c");
        assert!(specs[0]
            .filter
            .ends_with("metric.type=\"redis.googleapis.com/cluster/cpu/maximum_utilization\""));
    }

    #[tokio::test]
    async fn snapshot_applies_multiplier() {
        let source = StaticMetrics::default().with_metric(&cluster(), CPU_AVERAGE_UTILIZATION, 0.42);
        let specs = build_metrics("fakeProjectId", "fakeRegionId", "fakeClusterId");
        let snapshot = collect_snapshot(&source, &cluster(), &specs).await;

        let cpu = snapshot.get(CPU_AVERAGE_UTILIZATION).unwrap();
        assert!((cpu - 42.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_queries_are_left_out() {
        let source = StaticMetrics::default().with_metric(&cluster(), MAXIMUM_EVICTED_KEYS, 3.0);
        let specs = build_metrics("fakeProjectId", "fakeRegionId", "fakeClusterId");
        let snapshot = collect_snapshot(&source, &cluster(), &specs).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(MAXIMUM_EVICTED_KEYS), Some(3.0));
        assert_eq!(snapshot.get(CPU_MAXIMUM_UTILIZATION), None);
    }
}
