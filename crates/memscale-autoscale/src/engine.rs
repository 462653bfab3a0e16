//! Scaling decision engine.
//!
//! Evaluates every rule of a profile, resolves conflicting verdicts and
//! asks the resolver for a legal target size.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use memscale_core::{EnrichedConfig, MEMORY_AVERAGE_UTILIZATION, MetricsSnapshot, TopologyPolicy};

use crate::profiles;
use crate::resolver::resolve;
use crate::rules::{Direction, Rule, RuleVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    None,
}

/// The outcome of one decision cycle for one cluster. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingDecision {
    pub action: ScalingAction,
    pub target_size: u32,
    /// Rules that triggered in the winning direction, in evaluation order.
    pub triggered_rules: Vec<String>,
    pub rationale: String,
}

/// Aggregated verdicts before size resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub action: ScalingAction,
    pub magnitude: u32,
    pub triggered: Vec<&'static str>,
}

/// Evaluate rules independently. A rule that fails counts as not
/// triggered and is logged.
pub fn evaluate_rules(rules: &[Rule], snapshot: &MetricsSnapshot) -> Vec<(Rule, RuleVerdict)> {
    rules
        .iter()
        .filter_map(|rule| match rule.evaluate(snapshot) {
            Ok(verdict) => Some((*rule, verdict)),
            Err(e) => {
                warn!(rule = rule.name(), error = %e, "rule evaluation failed");
                None
            }
        })
        .collect()
}

/// Resolve verdicts into one action.
///
/// Any triggered UP verdict wins over DOWN. The magnitude is the largest
/// one requested in the winning direction, not the sum.
pub fn aggregate(verdicts: &[(Rule, RuleVerdict)]) -> Proposal {
    let triggered_in = |direction: Direction| {
        verdicts
            .iter()
            .filter(move |(_, v)| v.triggered && v.direction == direction)
    };

    let (action, direction) = if triggered_in(Direction::Up).next().is_some() {
        (ScalingAction::ScaleUp, Direction::Up)
    } else if triggered_in(Direction::Down).next().is_some() {
        (ScalingAction::ScaleDown, Direction::Down)
    } else {
        return Proposal {
            action: ScalingAction::None,
            magnitude: 0,
            triggered: Vec::new(),
        };
    };

    Proposal {
        action,
        magnitude: triggered_in(direction).map(|(_, v)| v.magnitude).max().unwrap_or(1),
        triggered: triggered_in(direction).map(|(r, _)| r.name()).collect(),
    }
}

pub struct ScalingDecisionEngine {
    topology: Arc<dyn TopologyPolicy>,
}

impl ScalingDecisionEngine {
    pub fn new(topology: Arc<dyn TopologyPolicy>) -> Self {
        Self { topology }
    }

    /// Decide for a cluster using the rules of its configured profile.
    pub fn decide(&self, config: &EnrichedConfig, snapshot: &MetricsSnapshot) -> ScalingDecision {
        self.decide_with(profiles::rules_for(config.scaling_profile), config, snapshot)
    }

    /// Decide using an explicit rule set.
    pub fn decide_with(
        &self,
        rules: &[Rule],
        config: &EnrichedConfig,
        snapshot: &MetricsSnapshot,
    ) -> ScalingDecision {
        let current = config.current_size;
        let verdicts = evaluate_rules(rules, snapshot);
        let proposal = aggregate(&verdicts);

        let resolution = resolve(
            proposal.action,
            proposal.magnitude,
            current,
            config,
            self.topology.as_ref(),
        );

        let triggered_rules: Vec<String> =
            proposal.triggered.iter().map(|name| name.to_string()).collect();
        let reasons = triggered_rules.join(", ");

        let decision = match (resolution.action, resolution.note) {
            (ScalingAction::None, note) => {
                let rationale = match (proposal.action, note) {
                    (ScalingAction::None, _) => "no rule triggered".to_string(),
                    (_, Some(note)) => format!("{reasons} triggered but {note}"),
                    (_, None) => format!("{reasons} triggered but size is unchanged"),
                };
                ScalingDecision {
                    action: ScalingAction::None,
                    target_size: current,
                    triggered_rules,
                    rationale,
                }
            }
            (action, note) => {
                let verb = match action {
                    ScalingAction::ScaleUp => "scale up",
                    _ => "scale down",
                };
                let mut rationale = format!(
                    "{verb} from {current} to {} shards: {reasons}",
                    resolution.target_size
                );
                if let Some(note) = note {
                    rationale.push_str(&format!(" ({note})"));
                }
                ScalingDecision {
                    action,
                    target_size: resolution.target_size,
                    triggered_rules,
                    rationale,
                }
            }
        };

        let decision = guard_free_memory(decision, config, snapshot);
        debug!(
            cluster = %config.cluster_id,
            action = ?decision.action,
            target = decision.target_size,
            rationale = %decision.rationale,
            "scaling decision"
        );
        decision
    }
}

/// Veto a scale-down that would leave less than `minFreeMemoryPercent`
/// of memory free at the target size.
fn guard_free_memory(
    decision: ScalingDecision,
    config: &EnrichedConfig,
    snapshot: &MetricsSnapshot,
) -> ScalingDecision {
    if decision.action != ScalingAction::ScaleDown || decision.target_size == 0 {
        return decision;
    }
    let Some(used) = snapshot
        .get(MEMORY_AVERAGE_UTILIZATION)
        .filter(|v| v.is_finite())
    else {
        return decision;
    };

    let projected = used * f64::from(config.current_size) / f64::from(decision.target_size);
    let ceiling = 100.0 - config.min_free_memory_percent;
    if projected <= ceiling {
        return decision;
    }

    ScalingDecision {
        action: ScalingAction::None,
        target_size: config.current_size,
        rationale: format!(
            "{} vetoed: projected memory utilization {projected:.1}% at {} shards \
             leaves less than {}% free",
            decision.triggered_rules.join(", "),
            decision.target_size,
            config.min_free_memory_percent
        ),
        triggered_rules: decision.triggered_rules,
    }
}
