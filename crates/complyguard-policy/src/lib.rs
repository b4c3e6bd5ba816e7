//! complyguard policy engine
//!
//! Declarative compliance rules for container and orchestration manifests.
//!
//! Rules come in three families:
//! - Image replacement (insecure or unpinned images)
//! - Namespace labeling (required labels on `Namespace` documents)
//! - Security context (required container security settings)
//!
//! The [`ManifestScanner`] turns parsed manifests into violations, the
//! [`AutoRemediator`] applies fixes with a backup before every write, and
//! [`ComplianceReport`] merges the results.

pub mod fs;
pub mod pattern;
pub mod remediate;
pub mod report;
pub mod rule;
pub mod scanner;

pub use fs::{backup_path, FileLocks, LocalFs, ManifestFs};
pub use pattern::ImagePattern;
pub use remediate::AutoRemediator;
pub use report::{compliance_score, ComplianceReport, PlanSummary};
pub use rule::{
    ImageRule, LabelRule, Rule, RuleFamily, RuleOrigin, RuleSet, RuleSource, SecurityContextRule,
};
pub use scanner::{ManifestScanner, ScanOutcome, SkippedDocument};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::remediate::AutoRemediator;
    pub use crate::report::{ComplianceReport, PlanSummary};
    pub use crate::rule::{Rule, RuleOrigin, RuleSet};
    pub use crate::scanner::{ManifestScanner, ScanOutcome};
}
