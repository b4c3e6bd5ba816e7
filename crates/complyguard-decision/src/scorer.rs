//! Priority scoring
//!
//! A violation's priority is the sum of the weights of the impact factors
//! the caller attached to it, plus a bonus for issue types that keep coming
//! back in history, capped at 100.

use complyguard_core::{RiskLevel, Violation, ViolationKind};
use complyguard_history::{FrequencyTable, History};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const BLOCKING_CI_WEIGHT: u32 = 40;
pub const SECURITY_RISK_WEIGHT: u32 = 35;
pub const MULTIPLE_FILES_WEIGHT: u32 = 25;
pub const FREQUENT_OCCURRENCE_WEIGHT: u32 = 20;

/// Bonus when an issue type occurred more than 3 times
pub const FREQUENT_HISTORY_BONUS: u32 = 15;

/// Bonus when an issue type occurred more than once
pub const RECURRING_HISTORY_BONUS: u32 = 5;

pub const MAX_PRIORITY: u8 = 100;

/// Impact flags attached to a violation by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImpactFactors {
    #[serde(default)]
    pub blocking_ci: bool,
    #[serde(default)]
    pub security_risk: bool,
    #[serde(default)]
    pub multiple_files: bool,
    #[serde(default)]
    pub frequent_occurrence: bool,
}

impl ImpactFactors {
    /// Sum of the weights of the flags that are set
    pub fn weight(&self) -> u32 {
        [
            (self.blocking_ci, BLOCKING_CI_WEIGHT),
            (self.security_risk, SECURITY_RISK_WEIGHT),
            (self.multiple_files, MULTIPLE_FILES_WEIGHT),
            (self.frequent_occurrence, FREQUENT_OCCURRENCE_WEIGHT),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, weight)| weight)
        .sum()
    }

    /// Derive the flags for one violation from the whole scan and history
    pub fn assess(violation: &Violation, all: &[Violation], frequencies: &FrequencyTable) -> Self {
        let files: HashSet<_> = all
            .iter()
            .filter(|other| other.kind == violation.kind)
            .map(|other| other.file.as_path())
            .collect();

        Self {
            blocking_ci: violation.risk_level == RiskLevel::Critical,
            security_risk: violation.risk_level >= RiskLevel::High
                || violation.kind == ViolationKind::SecurityContext,
            multiple_files: files.len() > 1,
            frequent_occurrence: frequencies.get(violation.kind.as_str()) > 3,
        }
    }
}

/// A violation together with its impact flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub violation: Violation,
    pub factors: ImpactFactors,
}

impl Issue {
    pub fn new(violation: Violation, factors: ImpactFactors) -> Self {
        Self { violation, factors }
    }

    /// Assess every violation of a scan
    pub fn assess_all(violations: &[Violation], frequencies: &FrequencyTable) -> Vec<Issue> {
        violations
            .iter()
            .map(|violation| {
                let factors = ImpactFactors::assess(violation, violations, frequencies);
                Issue::new(violation.clone(), factors)
            })
            .collect()
    }

    pub fn issue_type(&self) -> &str {
        self.violation.kind.as_str()
    }
}

/// Priority for an issue type with the given flags, in `0..=100`
pub fn priority(issue_type: &str, factors: ImpactFactors, frequencies: &FrequencyTable) -> u8 {
    let frequency = frequencies.get(issue_type);
    let bonus = if frequency > 3 {
        FREQUENT_HISTORY_BONUS
    } else if frequency > 1 {
        RECURRING_HISTORY_BONUS
    } else {
        0
    };

    (factors.weight() + bonus).min(MAX_PRIORITY as u32) as u8
}

/// Scores issues against one history snapshot
#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    frequencies: FrequencyTable,
}

impl PriorityScorer {
    pub fn new(frequencies: FrequencyTable) -> Self {
        Self { frequencies }
    }

    pub fn from_history(history: &History) -> Self {
        Self::new(history.frequencies())
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.frequencies
    }

    pub fn score(&self, issue: &Issue) -> u8 {
        priority(issue.issue_type(), issue.factors, &self.frequencies)
    }
}
