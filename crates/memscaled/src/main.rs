//! memscaled: the Memorystore shard autoscaler.
//!
//! Assembles the poller and the scaler over file-backed collaborators:
//! - `validate` enriches a payload and prints the resulting configs
//! - `decide` runs the decision engine on one published cluster state
//! - `poll` runs full cycles, with resizes logged instead of applied
//!
//! # Usage
//!
//! ```text
//! memscaled poll --payload clusters.json --metadata metadata.json \
//!     --metrics metrics.json --interval 60
//! ```

mod poll_mode;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use memscale_autoscale::ScalingDecisionEngine;
use memscale_core::{AutoscalerConfig, ClusterState, ShardTopology};
use memscale_poller::{ConfigValidator, StaticMetadata};

#[derive(Parser)]
#[command(name = "memscaled", about = "Memorystore shard autoscaler")]
struct Cli {
    /// TOML file overriding the built-in defaults and topology.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and enrich a cluster payload, printing the enriched configs.
    Validate {
        /// JSON array of cluster requests.
        #[arg(long)]
        payload: PathBuf,

        /// JSON object of cluster metadata keyed by
        /// `projects/<p>/locations/<r>/clusters/<c>`.
        #[arg(long)]
        metadata: PathBuf,
    },

    /// Decide for one published cluster state.
    Decide {
        /// JSON cluster state as published by the poller.
        #[arg(long)]
        state: PathBuf,
    },

    /// Run poll cycles through the scaler. Resizes are only logged.
    Poll {
        #[arg(long)]
        payload: PathBuf,

        #[arg(long)]
        metadata: PathBuf,

        /// JSON object of raw metric values keyed by cluster path, then name.
        #[arg(long)]
        metrics: PathBuf,

        /// Poll every N seconds until Ctrl-C. A single cycle when omitted.
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,memscaled=debug,memscale=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Validate { payload, metadata } => validate(&config, &payload, &metadata).await,
        Command::Decide { state } => decide(&config, &state),
        Command::Poll {
            payload,
            metadata,
            metrics,
            interval,
        } => poll_mode::run_poll(&config, &payload, &metadata, &metrics, interval).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AutoscalerConfig> {
    match path {
        Some(path) => {
            let config = AutoscalerConfig::from_file(path)?;
            info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(AutoscalerConfig::default()),
    }
}

pub(crate) fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn validate(config: &AutoscalerConfig, payload: &Path, metadata: &Path) -> anyhow::Result<()> {
    let metadata = StaticMetadata::from_json(&read(metadata)?)?;
    let validator = ConfigValidator::new(config, Arc::new(metadata));

    let enriched = validator.parse_and_enrich_payload(&read(payload)?).await?;
    info!(clusters = enriched.len(), "payload is valid");
    println!("{}", serde_json::to_string_pretty(&enriched)?);
    Ok(())
}

fn decide(config: &AutoscalerConfig, state: &Path) -> anyhow::Result<()> {
    let state: ClusterState =
        serde_json::from_str(&read(state)?).context("invalid cluster state")?;
    let engine = ScalingDecisionEngine::new(Arc::new(ShardTopology::from(&config.topology)));

    let decision = engine.decide(&state.config, &state.metrics);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
