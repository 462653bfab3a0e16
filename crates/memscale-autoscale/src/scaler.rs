//! Scaler: consumes published cluster states and applies decisions.
//!
//! Each message carries one cluster's enriched config and metrics. The
//! scaler decides and, for a non-NONE decision, hands the target size to
//! the resize callback. Messages are handled on their own tasks so a slow
//! resize never delays other clusters.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use memscale_core::{ClusterId, ClusterState, Envelope};

use crate::engine::{ScalingAction, ScalingDecision, ScalingDecisionEngine};

/// Callback type for performing the resize.
///
/// The scaler calls this with (cluster, target_shards).
pub type ResizeCallback = Box<dyn Fn(ClusterId, u32) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
>;

pub struct Scaler {
    engine: ScalingDecisionEngine,
    /// Callback to perform the resize.
    resize_fn: Option<ResizeCallback>,
}

impl Scaler {
    /// Create a new scaler.
    pub fn new(engine: ScalingDecisionEngine) -> Self {
        Self {
            engine,
            resize_fn: None,
        }
    }

    /// Set the callback used to perform resizes.
    pub fn with_resize_fn(mut self, f: ResizeCallback) -> Self {
        self.resize_fn = Some(f);
        self
    }

    /// Decide for one cluster state without acting on it.
    pub fn evaluate(&self, state: &ClusterState) -> ScalingDecision {
        self.engine.decide(&state.config, &state.metrics)
    }

    /// Handle one published message: decode, decide, resize.
    ///
    /// A resize failure is returned to the caller; the decision itself is
    /// not retried.
    pub async fn handle_message(&self, payload: &[u8]) -> anyhow::Result<ScalingDecision> {
        let state: ClusterState =
            serde_json::from_slice(payload).context("invalid cluster state message")?;
        let cluster = state.config.cluster();

        let decision = self.evaluate(&state);
        if decision.action == ScalingAction::None {
            debug!(%cluster, rationale = %decision.rationale, "no scaling needed");
            return Ok(decision);
        }

        info!(
            %cluster,
            action = ?decision.action,
            from = state.config.current_size,
            to = decision.target_size,
            rules = ?decision.triggered_rules,
            "scaling cluster"
        );

        if let Some(ref resize_fn) = self.resize_fn {
            resize_fn(cluster.clone(), decision.target_size)
                .await
                .with_context(|| {
                    format!("resize of {cluster} to {} shards failed", decision.target_size)
                })?;
        }

        Ok(decision)
    }

    /// Consume messages until the channel closes or shutdown is signalled.
    pub async fn run(
        self: Arc<Self>,
        mut messages: mpsc::Receiver<Envelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("scaler started");
        let mut tasks = tokio::task::JoinSet::new();

        loop {
            tokio::select! {
                message = messages.recv() => {
                    let Some(envelope) = message else { break };
                    let scaler = self.clone();
                    tasks.spawn(async move {
                        if let Err(e) = scaler.handle_message(&envelope.payload).await {
                            warn!(topic = %envelope.topic, error = %e, "scaling failed");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("scaler shutting down");
                    break;
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        info!("scaler stopped");
    }
}
