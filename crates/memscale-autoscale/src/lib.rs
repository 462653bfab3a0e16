//! memscale-autoscale: rule-based shard scaling decisions.
//!
//! Evaluates the rules of a cluster's scaling profile against the metrics
//! published by the poller, resolves conflicting verdicts, and computes a
//! target shard count that stays inside the configured bounds and names a
//! supported cluster shape.
//!
//! # Decision Algorithm
//!
//! ```text
//! verdicts  = every rule in profile(config.scalingProfile) on snapshot
//!             (a rule that errors counts as not triggered)
//!
//! if any UP verdict triggered:    action = SCALE_UP
//! elif any DOWN verdict:          action = SCALE_DOWN
//! else:                           action = NONE
//!
//! magnitude = max(magnitude of triggered verdicts in the winning direction)
//!
//! SCALE_UP:   bound = clamp(current + stepSize * magnitude, min, max)
//!             target = largest supported size in [min, bound]
//! SCALE_DOWN: bound = clamp(current - stepSize * magnitude, min, max)
//!             target = smallest supported size in [bound, max]
//!             vetoed if projected memory use breaks minFreeMemoryPercent
//! ```
//!
//! A target that cannot move in the requested direction turns the
//! decision into NONE.

pub mod engine;
pub mod profiles;
pub mod resolver;
pub mod rules;
pub mod scaler;

pub use engine::{ScalingAction, ScalingDecision, ScalingDecisionEngine};
pub use resolver::{Resolution, resolve};
pub use rules::{Direction, Rule, RuleError, RuleVerdict};
pub use scaler::Scaler;
