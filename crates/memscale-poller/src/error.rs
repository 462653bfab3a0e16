//! Error types for config validation and enrichment.
//!
//! The `Display` text of every variant is what operators and alerts
//! match on, so the wording is fixed.

use thiserror::Error;

use memscale_core::{ClusterId, TOPOLOGY_REFERENCE};

/// Result type alias for validation operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that reject a payload or a single cluster request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JSON in Autoscaler configuration: {0}")]
    Parse(String),

    /// One message per violation, each naming a `MemorystoreConfig/...` path.
    #[error("Invalid Autoscaler Configuration parameters:\n{}", .0.join("\n"))]
    Schema(Vec<String>),

    #[error("INVALID CONFIG: minSize ({min_size}) is below the minimum cluster size of {floor}.")]
    MinSizeBelowFloor { min_size: u32, floor: u32 },

    #[error(
        "INVALID CONFIG: {field} is {size} which is an invalid cluster configuration. Read more: {}",
        TOPOLOGY_REFERENCE
    )]
    UnsupportedTopology { field: &'static str, size: u32 },

    #[error("INVALID CONFIG: minSize ({min_size}) is larger than maxSize ({max_size}).")]
    MinSizeAboveMaxSize { min_size: u32, max_size: u32 },

    #[error("failed to fetch metadata for {cluster}: {source}")]
    Metadata {
        cluster: ClusterId,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_message_joins_violations() {
        let err = ConfigError::Schema(vec![
            "MemorystoreConfig/0/units must be equal to one of the allowed values".into(),
            "MemorystoreConfig/1 must have required property 'clusterId'".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid Autoscaler Configuration parameters:\n\
             MemorystoreConfig/0/units must be equal to one of the allowed values\n\
             MemorystoreConfig/1 must have required property 'clusterId'"
        );
    }

    #[test]
    fn topology_message_names_reference() {
        let err = ConfigError::UnsupportedTopology {
            field: "maxSize",
            size: 4,
        };
        assert_eq!(
            err.to_string(),
            "INVALID CONFIG: maxSize is 4 which is an invalid cluster configuration. \
             Read more: https://cloud.google.com/memorystore/docs/cluster/\
             cluster-node-specification#unsupported_cluster_shape"
        );
    }
}
