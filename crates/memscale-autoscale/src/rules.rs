//! Scaling rules.
//!
//! Each rule is one threshold condition over a single metric. Rules are
//! stateless: the verdict depends only on the snapshot, never on other
//! rules or earlier cycles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use memscale_core::{
    CPU_AVERAGE_UTILIZATION, CPU_MAXIMUM_UTILIZATION, MAXIMUM_EVICTED_KEYS,
    MEMORY_AVERAGE_UTILIZATION, MEMORY_MAXIMUM_UTILIZATION, MetricsSnapshot,
};

/// Each full band above an UP threshold adds one step to the magnitude.
const SEVERITY_BAND_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    None,
}

/// Outcome of one rule on one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub triggered: bool,
    pub direction: Direction,
    /// Requested change in steps. Zero when not triggered.
    pub magnitude: u32,
    pub rationale: String,
}

impl RuleVerdict {
    fn idle(rationale: String) -> Self {
        Self {
            triggered: false,
            direction: Direction::None,
            magnitude: 0,
            rationale,
        }
    }
}

/// Why a rule could not produce a verdict.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("metric {0} is missing from the snapshot")]
    MissingMetric(&'static str),

    #[error("metric {name} is not a finite number: {value}")]
    NonFinite { name: &'static str, value: f64 },
}

/// Every rule the scaler knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    CpuHighAverageUtilization,
    CpuHighMaximumUtilization,
    CpuLowAverageUtilization,
    CpuLowMaximumUtilization,
    MemoryHighAverageUtilization,
    MemoryHighMaximumUtilization,
    MemoryLowAverageUtilization,
    MemoryLowMaximumUtilization,
}

struct Threshold {
    metric: &'static str,
    direction: Direction,
    /// Percent.
    limit: f64,
    /// Scale-in is blocked while keys are being evicted.
    requires_no_evictions: bool,
    description: &'static str,
}

impl Rule {
    pub const ALL: [Rule; 8] = [
        Rule::CpuHighAverageUtilization,
        Rule::CpuHighMaximumUtilization,
        Rule::CpuLowAverageUtilization,
        Rule::CpuLowMaximumUtilization,
        Rule::MemoryHighAverageUtilization,
        Rule::MemoryHighMaximumUtilization,
        Rule::MemoryLowAverageUtilization,
        Rule::MemoryLowMaximumUtilization,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::CpuHighAverageUtilization => "cpuHighAverageUtilization",
            Rule::CpuHighMaximumUtilization => "cpuHighMaximumUtilization",
            Rule::CpuLowAverageUtilization => "cpuLowAverageUtilization",
            Rule::CpuLowMaximumUtilization => "cpuLowMaximumUtilization",
            Rule::MemoryHighAverageUtilization => "memoryHighAverageUtilization",
            Rule::MemoryHighMaximumUtilization => "memoryHighMaximumUtilization",
            Rule::MemoryLowAverageUtilization => "memoryLowAverageUtilization",
            Rule::MemoryLowMaximumUtilization => "memoryLowMaximumUtilization",
        }
    }

    pub fn from_name(name: &str) -> Option<Rule> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Direction this rule votes for when it triggers.
    pub fn direction(&self) -> Direction {
        self.threshold().direction
    }

    fn threshold(&self) -> Threshold {
        let (metric, direction, limit, description) = match self {
            Rule::CpuHighAverageUtilization => {
                (CPU_AVERAGE_UTILIZATION, Direction::Up, 70.0, "average CPU utilization")
            }
            Rule::CpuHighMaximumUtilization => {
                (CPU_MAXIMUM_UTILIZATION, Direction::Up, 80.0, "maximum CPU utilization")
            }
            Rule::CpuLowAverageUtilization => {
                (CPU_AVERAGE_UTILIZATION, Direction::Down, 50.0, "average CPU utilization")
            }
            Rule::CpuLowMaximumUtilization => {
                (CPU_MAXIMUM_UTILIZATION, Direction::Down, 60.0, "maximum CPU utilization")
            }
            Rule::MemoryHighAverageUtilization => {
                (MEMORY_AVERAGE_UTILIZATION, Direction::Up, 70.0, "average memory utilization")
            }
            Rule::MemoryHighMaximumUtilization => {
                (MEMORY_MAXIMUM_UTILIZATION, Direction::Up, 80.0, "maximum memory utilization")
            }
            Rule::MemoryLowAverageUtilization => {
                (MEMORY_AVERAGE_UTILIZATION, Direction::Down, 50.0, "average memory utilization")
            }
            Rule::MemoryLowMaximumUtilization => {
                (MEMORY_MAXIMUM_UTILIZATION, Direction::Down, 60.0, "maximum memory utilization")
            }
        };

        Threshold {
            metric,
            direction,
            limit,
            requires_no_evictions: matches!(
                self,
                Rule::MemoryLowAverageUtilization | Rule::MemoryLowMaximumUtilization
            ),
            description,
        }
    }

    /// Evaluate the rule against a snapshot.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Result<RuleVerdict, RuleError> {
        let t = self.threshold();
        let value = metric(snapshot, t.metric)?;

        let crossed = match t.direction {
            Direction::Up => value > t.limit,
            Direction::Down => value < t.limit,
            Direction::None => false,
        };
        if !crossed {
            return Ok(RuleVerdict::idle(format!(
                "{} {value:.1}% within threshold {}%",
                t.description, t.limit
            )));
        }

        if t.requires_no_evictions {
            let evicted = metric(snapshot, MAXIMUM_EVICTED_KEYS)?;
            if evicted > 0.0 {
                return Ok(RuleVerdict::idle(format!(
                    "{} {value:.1}% below {}% but {evicted} keys evicted",
                    t.description, t.limit
                )));
            }
        }

        let (magnitude, relation) = match t.direction {
            Direction::Up => {
                // `as` saturates; the resolver clamps to maxSize anyway.
                let bands = ((value - t.limit) / SEVERITY_BAND_PERCENT).floor() as u32;
                (1u32.saturating_add(bands), "above")
            }
            _ => (1, "below"),
        };

        Ok(RuleVerdict {
            triggered: true,
            direction: t.direction,
            magnitude,
            rationale: format!(
                "{} {value:.1}% {relation} threshold {}%",
                t.description, t.limit
            ),
        })
    }
}

fn metric(snapshot: &MetricsSnapshot, name: &'static str) -> Result<f64, RuleError> {
    let value = snapshot.get(name).ok_or(RuleError::MissingMetric(name))?;
    if !value.is_finite() {
        return Err(RuleError::NonFinite { name, value });
    }
    Ok(value)
}
