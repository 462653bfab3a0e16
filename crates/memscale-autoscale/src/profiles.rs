//! Scaling profiles: fixed groups of rules per metric family.
//!
//! Profiles are static slices. Nothing registers rules at runtime, so the
//! evaluation set for a profile is known at compile time.

use memscale_core::ScalingProfile;

use crate::rules::Rule;

pub const CPU_RULES: &[Rule] = &[
    Rule::CpuHighAverageUtilization,
    Rule::CpuHighMaximumUtilization,
    Rule::CpuLowAverageUtilization,
    Rule::CpuLowMaximumUtilization,
];

pub const MEMORY_RULES: &[Rule] = &[
    Rule::MemoryHighAverageUtilization,
    Rule::MemoryHighMaximumUtilization,
    Rule::MemoryLowAverageUtilization,
    Rule::MemoryLowMaximumUtilization,
];

const CPU_AND_MEMORY_RULES: &[Rule] = &[
    Rule::CpuHighAverageUtilization,
    Rule::CpuHighMaximumUtilization,
    Rule::CpuLowAverageUtilization,
    Rule::CpuLowMaximumUtilization,
    Rule::MemoryHighAverageUtilization,
    Rule::MemoryHighMaximumUtilization,
    Rule::MemoryLowAverageUtilization,
    Rule::MemoryLowMaximumUtilization,
];

/// Rules evaluated for a profile, in evaluation order.
pub fn rules_for(profile: ScalingProfile) -> &'static [Rule] {
    match profile {
        ScalingProfile::Cpu => CPU_RULES,
        ScalingProfile::Memory => MEMORY_RULES,
        ScalingProfile::CpuAndMemory => CPU_AND_MEMORY_RULES,
    }
}

/// Union of several profiles as one evaluation set. First occurrence wins
/// the position; duplicates are dropped.
pub fn evaluation_set(profiles: &[ScalingProfile]) -> Vec<Rule> {
    let mut rules: Vec<Rule> = Vec::new();
    for rule in profiles.iter().flat_map(|p| rules_for(*p)) {
        if !rules.contains(rule) {
            rules.push(*rule);
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Direction;

    #[test]
    fn memory_profile_holds_the_four_memory_rules() {
        let names: Vec<_> = rules_for(ScalingProfile::Memory)
            .iter()
            .map(|r| r.name())
            .collect();
        assert_eq!(
            names,
            [
                "memoryHighAverageUtilization",
                "memoryHighMaximumUtilization",
                "memoryLowAverageUtilization",
                "memoryLowMaximumUtilization",
            ]
        );
    }

    #[test]
    fn combined_profile_is_union() {
        assert_eq!(rules_for(ScalingProfile::Cpu).len(), 4);
        assert_eq!(
            rules_for(ScalingProfile::CpuAndMemory),
            evaluation_set(&[ScalingProfile::Cpu, ScalingProfile::Memory]).as_slice()
        );
    }

    #[test]
    fn union_drops_duplicates() {
        let rules = evaluation_set(&[
            ScalingProfile::Memory,
            ScalingProfile::CpuAndMemory,
            ScalingProfile::Memory,
        ]);
        assert_eq!(rules.len(), 8);
        assert_eq!(rules[0], Rule::MemoryHighAverageUtilization);
        assert_eq!(rules[4], Rule::CpuHighAverageUtilization);
    }

    #[test]
    fn every_profile_can_scale_both_ways() {
        for profile in ScalingProfile::ALL {
            let rules = rules_for(profile);
            assert!(rules.iter().any(|r| r.direction() == Direction::Up));
            assert!(rules.iter().any(|r| r.direction() == Direction::Down));
        }
    }
}
