//! Poller: one polling cycle over a batch of cluster requests.
//!
//! Each cluster runs its own pipeline (enrich → build metric specs →
//! collect metrics → publish). Pipelines run concurrently and a failure
//! is recorded for that cluster only.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use memscale_core::{ClusterId, ClusterState, EnrichedConfig};

use crate::error::{ConfigError, ConfigResult};
use crate::metrics::{build_metrics, collect_snapshot};
use crate::sources::{MetricsSource, Publisher};
use crate::validator::ConfigValidator;

/// What happened to one element of the payload.
#[derive(Debug)]
pub enum ClusterOutcome {
    /// Enriched config and metrics were published.
    Published { cluster: ClusterId, topic: String },
    /// Validation or enrichment rejected the request.
    Rejected { index: usize, error: ConfigError },
    /// Publication failed after a successful enrichment.
    Failed { cluster: ClusterId, error: anyhow::Error },
}

/// Outcomes of one cycle, in payload order.
#[derive(Debug, Default)]
pub struct PollReport {
    pub outcomes: Vec<ClusterOutcome>,
}

impl PollReport {
    pub fn published(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ClusterOutcome::Published { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.published()
    }
}

pub struct Poller {
    validator: ConfigValidator,
    metrics: Arc<dyn MetricsSource>,
    publisher: Arc<dyn Publisher>,
}

impl Poller {
    pub fn new(
        validator: ConfigValidator,
        metrics: Arc<dyn MetricsSource>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            validator,
            metrics,
            publisher,
        }
    }

    /// Run one cycle over the payload.
    ///
    /// Only malformed JSON fails the whole cycle.
    pub async fn poll(&self, raw: &str) -> ConfigResult<PollReport> {
        let enriched = self.validator.enrich_each(raw).await?;

        let outcomes = join_all(enriched.into_iter().enumerate().map(|(index, result)| async move {
            match result {
                Ok(config) => self.process(config).await,
                Err(error) => {
                    warn!(index, %error, "cluster config rejected");
                    ClusterOutcome::Rejected { index, error }
                }
            }
        }))
        .await;

        let report = PollReport { outcomes };
        info!(
            published = report.published(),
            failed = report.failures(),
            "poll cycle complete"
        );
        Ok(report)
    }

    async fn process(&self, config: EnrichedConfig) -> ClusterOutcome {
        let cluster = config.cluster();
        let topic = config.scaler_pub_sub_topic.clone();

        let specs = build_metrics(&config.project_id, &config.region_id, &config.cluster_id);
        let metrics = collect_snapshot(self.metrics.as_ref(), &cluster, &specs).await;
        let state = ClusterState { config, metrics };

        let result = async {
            let payload = serde_json::to_vec(&state)?;
            self.publisher.publish(&topic, payload).await
        }
        .await;

        match result {
            Ok(()) => {
                debug!(%cluster, %topic, "cluster state published");
                ClusterOutcome::Published { cluster, topic }
            }
            Err(error) => {
                warn!(%cluster, %topic, error = %error, "publish failed");
                ClusterOutcome::Failed { cluster, error }
            }
        }
    }

    /// Poll the same payload every `interval` until shutdown.
    pub async fn run(
        &self,
        payload: &str,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "poller started");

        loop {
            if let Err(e) = self.poll(payload).await {
                tracing::error!(error = %e, "poll cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("poller shutting down");
                    break;
                }
            }
        }
    }
}
