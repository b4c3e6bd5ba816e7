//! Remediation planning
//!
//! Buckets issues by priority: `>= 70` immediate, `40..70` batch, below 40
//! deferred. Each issue is scored exactly once, so buckets always agree
//! with the priorities they carry.

use complyguard_core::Violation;
use complyguard_policy::PlanSummary;
use serde::{Deserialize, Serialize};

use crate::scorer::{Issue, PriorityScorer};

pub const IMMEDIATE_THRESHOLD: u8 = 70;
pub const BATCH_THRESHOLD: u8 = 40;

/// Time units per issue, by tier
pub const IMMEDIATE_COST: u64 = 10;
pub const BATCH_COST: u64 = 5;
pub const DEFERRED_COST: u64 = 2;

/// Remediation tier for a priority score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationTier {
    Immediate,
    Batch,
    Deferred,
}

impl RemediationTier {
    pub fn from_score(score: u8) -> Self {
        if score >= IMMEDIATE_THRESHOLD {
            RemediationTier::Immediate
        } else if score >= BATCH_THRESHOLD {
            RemediationTier::Batch
        } else {
            RemediationTier::Deferred
        }
    }

    pub fn cost(&self) -> u64 {
        match self {
            RemediationTier::Immediate => IMMEDIATE_COST,
            RemediationTier::Batch => BATCH_COST,
            RemediationTier::Deferred => DEFERRED_COST,
        }
    }
}

/// An issue with the priority it was bucketed by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedIssue {
    pub issue: Issue,
    pub priority: u8,
}

/// Issues grouped by tier, each tier in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub immediate: Vec<PrioritizedIssue>,
    pub batch: Vec<PrioritizedIssue>,
    pub deferred: Vec<PrioritizedIssue>,
    /// Abstract time units: 10 per immediate, 5 per batch, 2 per deferred
    pub estimated_time: u64,
    /// Advisory only: more than two immediate issues
    pub parallelizable: bool,
}

impl RemediationPlan {
    pub fn len(&self) -> usize {
        self.immediate.len() + self.batch.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            immediate: self.immediate.len(),
            batch: self.batch.len(),
            deferred: self.deferred.len(),
            estimated_time: self.estimated_time,
            parallelizable: self.parallelizable,
        }
    }
}

/// Plans remediation using a [`PriorityScorer`]
#[derive(Debug, Clone, Default)]
pub struct RemediationPlanner {
    scorer: PriorityScorer,
}

impl RemediationPlanner {
    pub fn new(scorer: PriorityScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &PriorityScorer {
        &self.scorer
    }

    /// Bucket already-assessed issues
    pub fn plan(&self, issues: Vec<Issue>) -> RemediationPlan {
        let mut plan = RemediationPlan::default();

        for issue in issues {
            let priority = self.scorer.score(&issue);
            let tier = RemediationTier::from_score(priority);
            plan.estimated_time += tier.cost();

            let entry = PrioritizedIssue { issue, priority };
            match tier {
                RemediationTier::Immediate => plan.immediate.push(entry),
                RemediationTier::Batch => plan.batch.push(entry),
                RemediationTier::Deferred => plan.deferred.push(entry),
            }
        }

        plan.parallelizable = plan.immediate.len() > 2;
        plan
    }

    /// Assess impact factors from the scan itself, then bucket
    pub fn plan_violations(&self, violations: &[Violation]) -> RemediationPlan {
        self.plan(Issue::assess_all(violations, self.scorer.frequencies()))
    }
}
