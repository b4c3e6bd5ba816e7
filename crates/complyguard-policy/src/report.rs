//! Compliance report assembly

use chrono::{DateTime, Utc};
use complyguard_core::{Fix, Result, Violation};
use serde::{Deserialize, Serialize};

use crate::rule::RuleOrigin;
use crate::scanner::{ScanOutcome, SkippedDocument};

/// Counts from the remediation plan, as carried by the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub immediate: usize,
    pub batch: usize,
    pub deferred: usize,
    pub estimated_time: u64,
    pub parallelizable: bool,
}

/// One compliance report per scan pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub scan_timestamp: DateTime<Utc>,
    pub total_manifests_scanned: usize,
    pub violations_found: usize,
    /// Successful fixes
    pub auto_fixes_applied: usize,
    pub compliance_score: f64,
    pub rule_origin: RuleOrigin,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_documents: Vec<SkippedDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_plan: Option<PlanSummary>,
    pub violation_details: Vec<Violation>,
    /// Every fix attempt, failures included
    pub fix_details: Vec<Fix>,
    /// Violations that need a human
    pub remaining_violations: Vec<Violation>,
}

impl ComplianceReport {
    /// Merge scan, plan and remediation results into one report
    pub fn assemble(
        manifests_scanned: usize,
        rule_origin: RuleOrigin,
        scan: ScanOutcome,
        fixes: Vec<Fix>,
        plan: Option<PlanSummary>,
    ) -> Self {
        let compliance_score = compliance_score(&scan.violations, &fixes);
        let remaining_violations = scan
            .violations
            .iter()
            .filter(|violation| !violation.auto_fixable)
            .cloned()
            .collect();

        Self {
            scan_timestamp: Utc::now(),
            total_manifests_scanned: manifests_scanned,
            violations_found: scan.violations.len(),
            auto_fixes_applied: fixes.iter().filter(|fix| fix.success).count(),
            compliance_score,
            rule_origin,
            skipped_documents: scan.skipped,
            remediation_plan: plan,
            violation_details: scan.violations,
            fix_details: fixes,
            remaining_violations,
        }
    }

    /// Fix attempts that did not succeed
    pub fn failed_fixes(&self) -> impl Iterator<Item = &Fix> + '_ {
        self.fix_details.iter().filter(|fix| !fix.success)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Score summarizing scan and remediation outcome, 0 to 100.
///
/// - No violations: 100.0
/// - Some auto-fixable: `100 * (1 - non_auto / (total + 1)) * fixed / auto_fixable`
/// - None auto-fixable: `100 * (1 - total / (total + 10))`
///
/// Rounded to one decimal.
pub fn compliance_score(violations: &[Violation], fixes: &[Fix]) -> f64 {
    if violations.is_empty() {
        return 100.0;
    }

    let total = violations.len() as f64;
    let auto_fixable = violations.iter().filter(|v| v.auto_fixable).count() as f64;
    let fixed = fixes.iter().filter(|fix| fix.success).count() as f64;

    if auto_fixable > 0.0 {
        let fix_rate = fixed / auto_fixable;
        let remaining_non_auto = total - auto_fixable;
        let base = 100.0 * (1.0 - remaining_non_auto / (total + 1.0));
        round1(base * fix_rate)
    } else {
        round1(100.0 * (1.0 - total / (total + 10.0)))
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
