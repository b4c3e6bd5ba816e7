//! Scan pipeline
//!
//! rules -> scan -> plan -> remediate -> history -> report

use anyhow::Context;
use complyguard_core::{Fix, Violation};
use complyguard_decision::{BlockerPredictor, CandidateIssue, PriorityScorer, RemediationPlanner};
use complyguard_history::{HistoryRecord, HistoryStore};
use complyguard_policy::{AutoRemediator, ComplianceReport, ManifestScanner, RuleSet};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::GuardConfig;
use crate::loader::ManifestLoader;

/// Run one full scan pass and write the report
pub fn run_scan(config: &GuardConfig) -> anyhow::Result<ComplianceReport> {
    let rules = RuleSet::load(&config.rules_path);
    info!(rules = rules.len(), fallback = rules.is_fallback(), "Rules ready");

    let store = HistoryStore::new(&config.history_path);
    let history = store.load();

    let mut manifests = ManifestLoader::new(config).load(&config.manifests_dir);
    info!(
        dir = %config.manifests_dir.display(),
        files = manifests.len(),
        "Manifests loaded"
    );

    let scanner = ManifestScanner::new(&rules);
    let outcome = if config.parallel_scan {
        scanner.scan_parallel(&manifests)
    } else {
        scanner.scan(&manifests)
    };

    let planner = RemediationPlanner::new(PriorityScorer::from_history(&history));
    let plan = planner.plan_violations(&outcome.violations);
    info!(
        immediate = plan.immediate.len(),
        batch = plan.batch.len(),
        deferred = plan.deferred.len(),
        estimated_time = plan.estimated_time,
        "Remediation plan"
    );

    let fixes = if config.auto_remediate {
        AutoRemediator::new().remediate(&outcome.violations, &mut manifests)
    } else {
        info!("Dry run, no fixes applied");
        Vec::new()
    };

    if !fixes.is_empty() {
        let records = history_records(&outcome.violations, &fixes);
        if let Err(e) = store.record_all(records) {
            warn!(
                path = %store.path().display(),
                error = %e,
                "Failed to record remediation history"
            );
        }
    }

    let report = ComplianceReport::assemble(
        manifests.len(),
        rules.origin().clone(),
        outcome,
        fixes,
        Some(plan.summary()),
    );
    write_report(&report, &config.report_path)?;

    info!(
        violations = report.violations_found,
        fixed = report.auto_fixes_applied,
        score = report.compliance_score,
        report = %config.report_path.display(),
        "Scan complete"
    );
    Ok(report)
}

/// One history record per fix attempt
pub fn history_records(violations: &[Violation], fixes: &[Fix]) -> Vec<HistoryRecord> {
    fixes
        .iter()
        .map(|fix| {
            let issue_type = violations
                .get(fix.violation)
                .map(|violation| violation.kind.as_str())
                .unwrap_or(fix.fix_kind.as_str());
            let record = HistoryRecord::new(
                issue_type,
                Some(fix.file.display().to_string()),
                fix.success,
                fix.elapsed_ms,
            );
            match &fix.error {
                Some(error) => record.with_error(error.clone()),
                None => record,
            }
        })
        .collect()
}

pub fn write_report(report: &ComplianceReport, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create report directory {}", parent.display()))?;
    }
    let json = report.to_json_pretty()?;
    std::fs::write(path, json).with_context(|| format!("cannot write report {}", path.display()))?;
    Ok(())
}

/// Predict blockers for candidate paths
pub fn run_predict(paths: &[String]) -> anyhow::Result<Vec<CandidateIssue>> {
    let predictor = BlockerPredictor::new()?;
    Ok(predictor.predict(paths))
}

/// Failure patterns recorded in history
pub fn failure_patterns(config: &GuardConfig) -> BTreeMap<String, u64> {
    HistoryStore::new(&config.history_path).load().failure_patterns
}
