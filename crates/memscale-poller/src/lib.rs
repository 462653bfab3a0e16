//! memscale-poller: the polling half of the autoscaler.
//!
//! Takes the operator payload, validates and enriches every cluster
//! request with defaults and live metadata, collects the metrics the
//! scaling rules need, and publishes one message per cluster for the
//! scaler.
//!
//! # Architecture
//!
//! ```text
//! Poller::poll(payload)
//!   ├── ConfigValidator
//!   │   ├── schema::validate_request()  ← no I/O, fails fast
//!   │   ├── MetadataSource              ← one fetch per cluster
//!   │   └── merge_and_validate()        ← defaults + size invariants
//!   ├── build_metrics() → 6 MetricSpec per cluster
//!   ├── collect_snapshot() via MetricsSource
//!   └── Publisher::publish(scalerPubSubTopic, ClusterState)
//! ```
//!
//! Clusters are processed concurrently. A rejected or failing cluster is
//! reported in the `PollReport` and never aborts the rest of the batch.

pub mod error;
pub mod metrics;
pub mod poller;
pub mod schema;
pub mod sources;
pub mod validator;

pub use error::ConfigError;
pub use metrics::{build_metrics, collect_snapshot, MetricSpec};
pub use poller::{ClusterOutcome, PollReport, Poller};
pub use sources::{ChannelPublisher, MetadataSource, MetricsSource, Publisher, StaticMetadata, StaticMetrics};
pub use validator::ConfigValidator;
