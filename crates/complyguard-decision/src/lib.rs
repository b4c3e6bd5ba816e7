//! Decision layer for complyguard
//!
//! - [`PriorityScorer`]: 0-100 priority per issue from impact flags and history
//! - [`RemediationPlanner`]: buckets issues into immediate, batch and deferred work
//! - [`BlockerPredictor`]: flags file paths likely to break the pipeline

pub mod planner;
pub mod predictor;
pub mod scorer;

pub use planner::{PrioritizedIssue, RemediationPlan, RemediationPlanner, RemediationTier};
pub use predictor::{BlockerHeuristic, BlockerPredictor, CandidateIssue, Impact};
pub use scorer::{priority, ImpactFactors, Issue, PriorityScorer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::planner::{RemediationPlan, RemediationPlanner, RemediationTier};
    pub use crate::predictor::{BlockerPredictor, CandidateIssue, Impact};
    pub use crate::scorer::{ImpactFactors, Issue, PriorityScorer};
}
