//! Poll mode: runs the poller and the scaler in one process.
//!
//! The poller publishes into an in-process channel that the scaler
//! consumes. Resizes are logged, never applied.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use memscale_autoscale::scaler::{BoxFuture, ResizeCallback};
use memscale_autoscale::{ScalingDecisionEngine, Scaler};
use memscale_core::{AutoscalerConfig, ClusterId};
use memscale_poller::{
    ChannelPublisher, ClusterOutcome, ConfigValidator, Poller, StaticMetadata, StaticMetrics,
};

use crate::read;

const CHANNEL_CAPACITY: usize = 64;

/// Run one cycle, or cycles every `interval` seconds until Ctrl-C.
pub async fn run_poll(
    config: &AutoscalerConfig,
    payload: &Path,
    metadata: &Path,
    metrics: &Path,
    interval: Option<u64>,
) -> anyhow::Result<()> {
    let payload = read(payload)?;
    let metadata = StaticMetadata::from_json(&read(metadata)?)?;
    let metrics = StaticMetrics::from_json(&read(metrics)?)?;

    // ── Wiring ─────────────────────────────────────────────────

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let validator = ConfigValidator::new(config, Arc::new(metadata));
    let topology = validator.topology();
    let poller = Poller::new(
        validator,
        Arc::new(metrics),
        Arc::new(ChannelPublisher::new(tx)),
    );
    let scaler = Arc::new(
        Scaler::new(ScalingDecisionEngine::new(topology)).with_resize_fn(dry_run()),
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scaler_handle = tokio::spawn(scaler.run(rx, shutdown_rx.clone()));

    match interval {
        None => {
            let report = poller.poll(&payload).await?;
            for outcome in &report.outcomes {
                match outcome {
                    ClusterOutcome::Published { cluster, topic } => {
                        info!(%cluster, %topic, "published")
                    }
                    ClusterOutcome::Rejected { index, error } => {
                        warn!(index, %error, "rejected")
                    }
                    ClusterOutcome::Failed { cluster, error } => {
                        warn!(%cluster, error = %error, "failed")
                    }
                }
            }
            // Closing the channel lets the scaler drain and stop.
            drop(poller);
        }
        Some(secs) => {
            let poller_shutdown = shutdown_rx.clone();
            let poller_handle = tokio::spawn(async move {
                poller
                    .run(&payload, Duration::from_secs(secs), poller_shutdown)
                    .await;
            });

            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            let _ = poller_handle.await;
        }
    }

    let _ = scaler_handle.await;
    drop(shutdown_tx);

    info!("memscaled stopped");
    Ok(())
}

fn dry_run() -> ResizeCallback {
    Box::new(|cluster: ClusterId, target: u32| -> BoxFuture {
        Box::pin(async move {
            info!(%cluster, target, "dry run: resize not applied");
            Ok(())
        })
    })
}
