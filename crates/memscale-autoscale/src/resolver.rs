//! Target size resolution.
//!
//! Turns a direction and magnitude into a shard count that lies within
//! `[minSize, maxSize]` and is a supported topology. When no such size
//! moves the cluster in the requested direction, the result is NONE.

use tracing::debug;

use memscale_core::{EnrichedConfig, TopologyPolicy};

use crate::engine::ScalingAction;

/// A resolved target size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub action: ScalingAction,
    pub target_size: u32,
    /// Set when the target was snapped or the action was dropped.
    pub note: Option<String>,
}

impl Resolution {
    fn unchanged(current: u32, note: Option<String>) -> Self {
        Self {
            action: ScalingAction::None,
            target_size: current,
            note,
        }
    }
}

/// Compute the target size for `action`.
///
/// `magnitude` is in steps of `config.step_size`; zero is treated as one.
pub fn resolve(
    action: ScalingAction,
    magnitude: u32,
    current: u32,
    config: &EnrichedConfig,
    topology: &dyn TopologyPolicy,
) -> Resolution {
    let (min, max) = (config.min_size, config.max_size);
    let step = config.step_size.saturating_mul(magnitude.max(1));

    let resolution = match action {
        ScalingAction::None => return Resolution::unchanged(current, None),
        _ if min > max => {
            return Resolution::unchanged(
                current,
                Some(format!("minSize ({min}) is larger than maxSize ({max})")),
            );
        }
        ScalingAction::ScaleUp => {
            let bound = current.saturating_add(step).clamp(min, max);
            match (min..=bound).rev().find(|n| topology.is_supported(*n)) {
                Some(target) if target > current => Resolution {
                    action,
                    target_size: target,
                    note: (target != bound)
                        .then(|| format!("snapped from {bound} to supported size {target}")),
                },
                Some(_) => Resolution::unchanged(
                    current,
                    Some(format!(
                        "no supported size above {current} within maxSize ({max})"
                    )),
                ),
                None => Resolution::unchanged(
                    current,
                    Some(format!(
                        "no supported size between minSize ({min}) and {bound}"
                    )),
                ),
            }
        }
        ScalingAction::ScaleDown => {
            let bound = current.saturating_sub(step).clamp(min, max);
            match (bound..=max).find(|n| topology.is_supported(*n)) {
                Some(target) if target < current => Resolution {
                    action,
                    target_size: target,
                    note: (target != bound)
                        .then(|| format!("snapped from {bound} to supported size {target}")),
                },
                Some(_) => Resolution::unchanged(
                    current,
                    Some(format!(
                        "no supported size below {current} within minSize ({min})"
                    )),
                ),
                None => Resolution::unchanged(
                    current,
                    Some(format!(
                        "no supported size between {bound} and maxSize ({max})"
                    )),
                ),
            }
        }
    };

    debug!(
        cluster = %config.cluster_id,
        ?action,
        current,
        target = resolution.target_size,
        note = resolution.note.as_deref().unwrap_or(""),
        "target size resolved"
    );
    resolution
}
