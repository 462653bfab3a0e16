//! Config validation and enrichment.
//!
//! A payload goes through three stages, in this order:
//!
//! 1. `schema::validate_request()` for every element (no I/O)
//! 2. the size checks that need no metadata, then one `MetadataSource`
//!    fetch per cluster, run concurrently
//! 3. `merge_and_validate()`: defaults, then the size invariants
//!
//! The validator holds only immutable configuration and is shared freely
//! across concurrent cycles.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use memscale_core::config::Defaults;
use memscale_core::{
    AutoscalerConfig, ClusterMetadata, ClusterRequest, EnrichedConfig, ShardTopology,
    TopologyPolicy,
};

use crate::error::{ConfigError, ConfigResult};
use crate::schema;
use crate::sources::MetadataSource;

pub struct ConfigValidator {
    defaults: Defaults,
    /// Smallest legal cluster size.
    min_cluster_size: u32,
    topology: Arc<dyn TopologyPolicy>,
    metadata: Arc<dyn MetadataSource>,
}

impl ConfigValidator {
    /// Create a validator using the configured defaults and topology rules.
    pub fn new(config: &AutoscalerConfig, metadata: Arc<dyn MetadataSource>) -> Self {
        Self {
            defaults: config.defaults.clone(),
            min_cluster_size: config.topology.min_cluster_size,
            topology: Arc::new(ShardTopology::from(&config.topology)),
            metadata,
        }
    }

    /// Replace the topology legality check.
    pub fn with_topology(mut self, topology: Arc<dyn TopologyPolicy>) -> Self {
        self.topology = topology;
        self
    }

    pub fn topology(&self) -> Arc<dyn TopologyPolicy> {
        self.topology.clone()
    }

    /// Validate and enrich a whole payload.
    ///
    /// Fails on the first problem: a parse error, any schema violation
    /// (all of them are reported together), or the first cluster in input
    /// order whose fetch or size checks fail. Output order matches input.
    pub async fn parse_and_enrich_payload(&self, raw: &str) -> ConfigResult<Vec<EnrichedConfig>> {
        let elements = parse_payload(raw)?;

        let mut requests = Vec::with_capacity(elements.len());
        let mut violations = Vec::new();
        for (index, value) in elements.iter().enumerate() {
            match schema::validate_request(index, value) {
                Ok(request) => requests.push(request),
                Err(errors) => violations.extend(errors),
            }
        }
        if !violations.is_empty() {
            return Err(ConfigError::Schema(violations));
        }

        join_all(requests.into_iter().map(|request| self.enrich(request)))
            .await
            .into_iter()
            .collect()
    }

    /// Validate and enrich each element independently.
    ///
    /// Only malformed JSON fails the whole payload; every element gets its
    /// own outcome, at the index it had in the input.
    pub async fn enrich_each(
        &self,
        raw: &str,
    ) -> ConfigResult<Vec<ConfigResult<EnrichedConfig>>> {
        let elements = parse_payload(raw)?;

        let outcomes = join_all(elements.iter().enumerate().map(|(index, value)| async move {
            let request = schema::validate_request(index, value).map_err(ConfigError::Schema)?;
            self.enrich(request).await
        }))
        .await;

        Ok(outcomes)
    }

    /// Fetch metadata for one schema-valid request and enrich it.
    pub async fn enrich(&self, request: ClusterRequest) -> ConfigResult<EnrichedConfig> {
        self.check_requested_sizes(&request)?;

        let cluster = request.cluster();
        debug!(%cluster, "fetching cluster metadata");

        let metadata = self
            .metadata
            .cluster_metadata(&cluster)
            .await
            .map_err(|e| {
                warn!(%cluster, error = %e, "metadata fetch failed");
                ConfigError::Metadata {
                    cluster: cluster.clone(),
                    source: e.into(),
                }
            })?;

        let config = self.merge_and_validate(request, metadata)?;
        info!(
            %cluster,
            current_size = config.current_size,
            min_size = config.min_size,
            max_size = config.max_size,
            profile = %config.scaling_profile,
            "cluster config enriched"
        );
        Ok(config)
    }

    /// Merge defaults and metadata into a request and check the size
    /// invariants. Pure: no I/O.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// minSize floor, minSize topology, maxSize topology, minSize <= maxSize.
    pub fn merge_and_validate(
        &self,
        request: ClusterRequest,
        metadata: ClusterMetadata,
    ) -> ConfigResult<EnrichedConfig> {
        let defaults = &self.defaults;
        let min_size = request.min_size.unwrap_or(defaults.min_size);
        let max_size = request
            .max_size
            .unwrap_or_else(|| defaults.max_size.max(metadata.current_size));

        self.check_sizes(min_size, Some(max_size))?;

        Ok(EnrichedConfig {
            project_id: request.project_id,
            region_id: request.region_id,
            cluster_id: request.cluster_id,
            units: request.units.unwrap_or_default(),
            scaler_pub_sub_topic: request.scaler_pub_sub_topic,
            min_size,
            max_size,
            step_size: request.step_size.unwrap_or(defaults.step_size),
            min_free_memory_percent: request
                .min_free_memory_percent
                .unwrap_or(defaults.min_free_memory_percent),
            scaling_profile: request.scaling_profile.unwrap_or(defaults.scaling_profile),
            current_size: metadata.current_size,
            shard_count: metadata.shard_count,
        })
    }

    /// The size checks that need no metadata, run before the fetch so a
    /// request that can never be valid costs no API call.
    fn check_requested_sizes(&self, request: &ClusterRequest) -> ConfigResult<()> {
        let min_size = request.min_size.unwrap_or(self.defaults.min_size);
        self.check_sizes(min_size, request.max_size)
    }

    /// `max_size` is `None` when it still depends on the live cluster.
    fn check_sizes(&self, min_size: u32, max_size: Option<u32>) -> ConfigResult<()> {
        if min_size < self.min_cluster_size {
            return Err(ConfigError::MinSizeBelowFloor {
                min_size,
                floor: self.min_cluster_size,
            });
        }
        if !self.topology.is_supported(min_size) {
            return Err(ConfigError::UnsupportedTopology {
                field: "minSize",
                size: min_size,
            });
        }
        let Some(max_size) = max_size else {
            return Ok(());
        };
        if !self.topology.is_supported(max_size) {
            return Err(ConfigError::UnsupportedTopology {
                field: "maxSize",
                size: max_size,
            });
        }
        if min_size > max_size {
            return Err(ConfigError::MinSizeAboveMaxSize { min_size, max_size });
        }
        Ok(())
    }
}

/// Parse the payload into its array elements.
fn parse_payload(raw: &str) -> ConfigResult<Vec<Value>> {
    let value: Value = serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    match value {
        Value::Array(elements) => Ok(elements),
        _ => Err(ConfigError::Schema(vec![schema::not_an_array()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use memscale_core::{ClusterId, ScalingProfile, Units};
    use serde_json::json;

    use crate::sources::StaticMetadata;

    const FIVE: ClusterMetadata = ClusterMetadata {
        current_size: 5,
        shard_count: 5,
    };

    /// Answers every cluster with the same metadata and counts calls.
    struct CountingMetadata {
        metadata: ClusterMetadata,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataSource for CountingMetadata {
        async fn cluster_metadata(&self, _cluster: &ClusterId) -> anyhow::Result<ClusterMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.metadata)
        }
    }

    fn counting(metadata: ClusterMetadata) -> Arc<CountingMetadata> {
        Arc::new(CountingMetadata {
            metadata,
            calls: AtomicUsize::new(0),
        })
    }

    fn validator() -> ConfigValidator {
        ConfigValidator::new(&AutoscalerConfig::default(), counting(FIVE))
    }

    fn request(extra: Value) -> String {
        let mut base = json!({
            "projectId": "project1",
            "regionId": "region1",
            "clusterId": "cluster1",
            "units": "SHARDS",
            "scalerPubSubTopic": "projects/myproject/topics/scaler-topic",
        });
        for (k, v) in extra.as_object().unwrap() {
            base[k] = v.clone();
        }
        json!([base]).to_string()
    }

    async fn reject(payload: &str) -> String {
        validator()
            .parse_and_enrich_payload(payload)
            .await
            .unwrap_err()
            .to_string()
    }

    #[tokio::test]
    async fn default_step_size() {
        let configs = validator().parse_and_enrich_payload(&request(json!({}))).await.unwrap();
        assert_eq!(configs[0].step_size, 1);
    }

    #[tokio::test]
    async fn default_min_free_memory_percent() {
        let configs = validator().parse_and_enrich_payload(&request(json!({}))).await.unwrap();
        assert_eq!(configs[0].min_free_memory_percent, 30.0);
        assert_eq!(configs[0].scaling_profile, ScalingProfile::CpuAndMemory);
    }

    #[tokio::test]
    async fn override_min_size() {
        let payload = request(json!({ "minSize": 6 }));
        let configs = validator().parse_and_enrich_payload(&payload).await.unwrap();
        assert_eq!(configs[0].units, Units::Shards);
        assert_eq!(configs[0].min_size, 6);
    }

    #[tokio::test]
    async fn override_min_free_memory_percent_without_units() {
        let payload = json!([{
            "projectId": "project1",
            "regionId": "region1",
            "clusterId": "spanner1",
            "scalerPubSubTopic": "projects/myproject/topics/scaler-topic",
            "minFreeMemoryPercent": 20,
        }])
        .to_string();
        let configs = validator().parse_and_enrich_payload(&payload).await.unwrap();
        assert_eq!(configs[0].min_free_memory_percent, 20.0);
        assert_eq!(configs[0].units, Units::Shards);
    }

    #[tokio::test]
    async fn merges_defaults_and_metadata() {
        let payload = request(json!({ "minSize": 5 }));
        let configs = validator().parse_and_enrich_payload(&payload).await.unwrap();
        let config = &configs[0];
        assert_eq!(config.min_size, 5);
        assert_eq!(config.max_size, 10);
        assert_eq!(config.step_size, 1);
        assert_eq!(config.current_size, 5);
        assert_eq!(config.shard_count, 5);
    }

    #[tokio::test]
    async fn default_max_size_follows_larger_cluster() {
        let metadata = ClusterMetadata {
            current_size: 14,
            shard_count: 14,
        };
        let validator = ConfigValidator::new(&AutoscalerConfig::default(), counting(metadata));
        let configs = validator.parse_and_enrich_payload(&request(json!({}))).await.unwrap();
        assert_eq!(configs[0].max_size, 14);

        let explicit = request(json!({ "maxSize": 12 }));
        let configs = validator.parse_and_enrich_payload(&explicit).await.unwrap();
        assert_eq!(configs[0].max_size, 12);
    }

    #[tokio::test]
    async fn rejects_units_other_than_shards() {
        let payload = request(json!({ "units": "INVALID_UNITS", "minSize": 5 }));
        assert_eq!(
            reject(&payload).await,
            "Invalid Autoscaler Configuration parameters:\n\
             MemorystoreConfig/0/units must be equal to one of the allowed values"
        );
    }

    #[tokio::test]
    async fn rejects_min_size_below_floor() {
        let payload = request(json!({ "minSize": 2 }));
        assert_eq!(
            reject(&payload).await,
            "INVALID CONFIG: minSize (2) is below the minimum cluster size of 3."
        );
    }

    #[tokio::test]
    async fn rejects_unsupported_min_size() {
        for max in [json!(null), json!(10), json!(3)] {
            let mut extra = json!({ "minSize": 4 });
            if !max.is_null() {
                extra["maxSize"] = max;
            }
            assert_eq!(
                reject(&request(extra)).await,
                "INVALID CONFIG: minSize is 4 which is an invalid cluster configuration. \
                 Read more: https://cloud.google.com/memorystore/docs/cluster/\
                 cluster-node-specification#unsupported_cluster_shape"
            );
        }
    }

    #[tokio::test]
    async fn rejects_unsupported_max_size() {
        let payload = request(json!({ "maxSize": 4 }));
        assert_eq!(
            reject(&payload).await,
            "INVALID CONFIG: maxSize is 4 which is an invalid cluster configuration. \
             Read more: https://cloud.google.com/memorystore/docs/cluster/\
             cluster-node-specification#unsupported_cluster_shape"
        );
    }

    #[tokio::test]
    async fn rejects_min_size_larger_than_max_size() {
        let payload = request(json!({ "minSize": 10, "maxSize": 5 }));
        assert_eq!(
            reject(&payload).await,
            "INVALID CONFIG: minSize (10) is larger than maxSize (5)."
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let err = validator().parse_and_enrich_payload("[{").await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("Invalid JSON in Autoscaler configuration: "));
    }

    #[tokio::test]
    async fn non_array_payload_is_rejected() {
        let err = validator().parse_and_enrich_payload("{}").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Autoscaler Configuration parameters:\nMemorystoreConfig must be array"
        );
    }

    #[tokio::test]
    async fn schema_errors_skip_metadata_fetch() {
        let source = counting(FIVE);
        let validator = ConfigValidator::new(&AutoscalerConfig::default(), source.clone());
        let payload = json!([
            { "projectId": "p", "regionId": "r", "clusterId": "a", "scalerPubSubTopic": "t" },
            { "projectId": "p", "regionId": "r", "clusterId": "b", "scalerPubSubTopic": "t", "units": "NODES" },
        ])
        .to_string();

        let err = validator.parse_and_enrich_payload(&payload).await.unwrap_err();
        assert!(err.to_string().contains("MemorystoreConfig/1/units"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_sizes_skip_metadata_fetch() {
        let source = counting(FIVE);
        let validator = ConfigValidator::new(&AutoscalerConfig::default(), source.clone());

        for (extra, expected) in [
            (json!({ "minSize": 2 }), "INVALID CONFIG: minSize (2) is below the minimum cluster size of 3."),
            (json!({ "minSize": 10, "maxSize": 5 }), "INVALID CONFIG: minSize (10) is larger than maxSize (5)."),
        ] {
            let err = validator.parse_and_enrich_payload(&request(extra)).await.unwrap_err();
            assert_eq!(err.to_string(), expected);
        }

        let err = validator.parse_and_enrich_payload(&request(json!({ "maxSize": 4 }))).await.unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedTopology { field: "maxSize", size: 4 }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        validator.parse_and_enrich_payload(&request(json!({}))).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let metadata = StaticMetadata::default()
            .with_cluster(&ClusterId::new("p", "r", "a"), ClusterMetadata { current_size: 3, shard_count: 3 })
            .with_cluster(&ClusterId::new("p", "r", "b"), ClusterMetadata { current_size: 7, shard_count: 7 })
            .with_cluster(&ClusterId::new("p", "r", "c"), ClusterMetadata { current_size: 5, shard_count: 5 });
        let validator = ConfigValidator::new(&AutoscalerConfig::default(), Arc::new(metadata));
        let payload = json!([
            { "projectId": "p", "regionId": "r", "clusterId": "b", "scalerPubSubTopic": "t" },
            { "projectId": "p", "regionId": "r", "clusterId": "a", "scalerPubSubTopic": "t" },
            { "projectId": "p", "regionId": "r", "clusterId": "c", "scalerPubSubTopic": "t" },
        ])
        .to_string();

        let configs = validator.parse_and_enrich_payload(&payload).await.unwrap();
        let ids: Vec<_> = configs.iter().map(|c| c.cluster_id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert_eq!(configs[0].current_size, 7);
    }

    #[tokio::test]
    async fn enrichment_is_idempotent() {
        let payload = request(json!({ "minSize": 5, "minFreeMemoryPercent": 25 }));
        let validator = validator();
        let first = validator.parse_and_enrich_payload(&payload).await.unwrap();
        let second = validator.parse_and_enrich_payload(&payload).await.unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn enrich_each_isolates_failures() {
        let metadata = StaticMetadata::default()
            .with_cluster(&ClusterId::new("p", "r", "ok"), FIVE)
            .with_cluster(&ClusterId::new("p", "r", "small"), FIVE);
        let validator = ConfigValidator::new(&AutoscalerConfig::default(), Arc::new(metadata));
        let payload = json!([
            { "projectId": "p", "regionId": "r", "clusterId": "ok", "scalerPubSubTopic": "t" },
            { "projectId": "p", "regionId": "r", "clusterId": "small", "scalerPubSubTopic": "t", "minSize": 2 },
            { "projectId": "p", "regionId": "r", "clusterId": "bad", "scalerPubSubTopic": "t", "units": "NODES" },
            { "projectId": "p", "regionId": "r", "clusterId": "missing", "scalerPubSubTopic": "t" },
        ])
        .to_string();

        let outcomes = validator.enrich_each(&payload).await.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].as_ref().unwrap().cluster_id, "ok");
        assert!(matches!(outcomes[1], Err(ConfigError::MinSizeBelowFloor { min_size: 2, floor: 3 })));
        assert_eq!(
            outcomes[2].as_ref().unwrap_err().to_string(),
            "Invalid Autoscaler Configuration parameters:\n\
             MemorystoreConfig/2/units must be equal to one of the allowed values"
        );
        assert!(matches!(outcomes[3], Err(ConfigError::Metadata { .. })));
    }

    #[test]
    fn injected_topology_is_used() {
        let validator = validator().with_topology(Arc::new(|n: u32| n % 3 == 0));
        let req: ClusterRequest = serde_json::from_value(json!({
            "projectId": "p",
            "regionId": "r",
            "clusterId": "c",
            "scalerPubSubTopic": "t",
            "minSize": 6,
            "maxSize": 10,
        }))
        .unwrap();

        let err = validator.merge_and_validate(req, FIVE).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedTopology { field: "maxSize", size: 10 }));
    }
}
