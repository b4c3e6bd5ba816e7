//! Remediation history
//!
//! Two append-only streams of outcome records: failures (`ci_failures`) and
//! successes (`remediation_success`). Aggregates are derived from the
//! streams each time history is loaded or persisted, never edited in place.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Pattern key: path with a redundant trailing `.txt`
pub const DOUBLE_EXTENSION: &str = "double_extension";

/// Pattern key: failure about naming
pub const NAMING_VIOLATION: &str = "naming_violation";

/// Pattern key: failure about dependencies
pub const DEPENDENCY_ISSUE: &str = "dependency_issue";

/// One remediation or pipeline outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub issue_type: String,

    /// Error classification, when the producer supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Error message of a failed attempt. Never classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub file_path: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,

    /// Milliseconds spent on the attempt
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_taken: u64,

    /// RFC 3339 time the record was created
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

/// Older writers emit `null` for fields they had no value for
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl HistoryRecord {
    pub fn new(
        issue_type: impl Into<String>,
        file_path: Option<String>,
        success: bool,
        time_taken: u64,
    ) -> Self {
        Self {
            issue_type: issue_type.into(),
            error_type: None,
            error: None,
            file_path,
            success,
            time_taken,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Classification used for pattern extraction
    fn classification(&self) -> &str {
        self.error_type.as_deref().unwrap_or(&self.issue_type)
    }
}

/// The persisted history document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub ci_failures: Vec<HistoryRecord>,

    #[serde(default)]
    pub remediation_success: Vec<HistoryRecord>,

    /// Derived: pattern key to count over `ci_failures`
    #[serde(default)]
    pub failure_patterns: BTreeMap<String, u64>,

    /// Derived: mean `time_taken` per issue type over both streams
    #[serde(default)]
    pub execution_times: BTreeMap<String, f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl History {
    /// Append a record to the stream matching its outcome
    pub fn append(&mut self, record: HistoryRecord) {
        if record.success {
            self.remediation_success.push(record);
        } else {
            self.ci_failures.push(record);
        }
    }

    /// Every record, failures first
    pub fn records(&self) -> impl Iterator<Item = &HistoryRecord> + '_ {
        self.ci_failures.iter().chain(self.remediation_success.iter())
    }

    pub fn len(&self) -> usize {
        self.ci_failures.len() + self.remediation_success.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute derived aggregates from the streams
    pub fn refresh_derived(&mut self) {
        self.failure_patterns = self.extract_patterns();
        self.execution_times = self.mean_execution_times();
    }

    /// Count recognized failure patterns
    pub fn extract_patterns(&self) -> BTreeMap<String, u64> {
        let mut patterns = BTreeMap::new();

        for failure in &self.ci_failures {
            let path = failure.file_path.as_deref().unwrap_or_default();
            let classification = failure.classification().to_lowercase();

            if path.contains(".txt") && path.ends_with(".txt") {
                *patterns.entry(DOUBLE_EXTENSION.to_string()).or_insert(0) += 1;
            }
            if classification.contains("naming") {
                *patterns.entry(NAMING_VIOLATION.to_string()).or_insert(0) += 1;
            }
            if classification.contains("dependency") {
                *patterns.entry(DEPENDENCY_ISSUE.to_string()).or_insert(0) += 1;
            }
        }

        patterns
    }

    fn mean_execution_times(&self) -> BTreeMap<String, f64> {
        let mut totals: BTreeMap<String, (f64, u64)> = BTreeMap::new();
        for record in self.records() {
            let entry = totals.entry(record.issue_type.clone()).or_insert((0.0, 0));
            entry.0 += record.time_taken as f64;
            entry.1 += 1;
        }

        totals
            .into_iter()
            .map(|(issue_type, (total, count))| (issue_type, total / count as f64))
            .collect()
    }

    /// Occurrence counts per issue type, for priority scoring
    pub fn frequencies(&self) -> FrequencyTable {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for record in self.records() {
            *counts.entry(record.issue_type.clone()).or_insert(0) += 1;
        }

        // A failure filed under a pattern-named type already shows up in
        // both maps; keep the larger count instead of adding them.
        for (pattern, count) in self.extract_patterns() {
            let entry = counts.entry(pattern).or_insert(0);
            *entry = (*entry).max(count);
        }

        FrequencyTable { counts }
    }
}

/// Read-only snapshot of how often each issue type occurred
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable {
    counts: BTreeMap<String, u64>,
}

impl FrequencyTable {
    pub fn from_counts(counts: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self {
            counts: counts.into_iter().collect(),
        }
    }

    /// Occurrences of an issue type, zero when never seen
    pub fn get(&self, issue_type: &str) -> u64 {
        self.counts.get(issue_type).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(issue_type: &str, path: &str) -> HistoryRecord {
        HistoryRecord::new(issue_type, Some(path.to_string()), false, 10)
    }

    #[test]
    fn test_append_routes_by_outcome() {
        let mut history = History::default();
        history.append(failure("image_compliance", "a.yaml"));
        history.append(HistoryRecord::new("image_compliance", None, true, 4));

        assert_eq!(history.ci_failures.len(), 1);
        assert_eq!(history.remediation_success.len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_extract_patterns() {
        let mut history = History::default();
        history.append(failure("lint", "scripts/hash.py.txt"));
        history.append(failure("naming", "manifests/tmp.yaml"));
        history.append(failure("x", "a.yaml").with_error_type("Dependency conflict"));
        history.append(failure("Naming-Dependency", "notes.txt"));
        // successes never contribute
        history.append(HistoryRecord::new("naming", Some("b.txt".into()), true, 1));

        let patterns = history.extract_patterns();
        assert_eq!(patterns.get(DOUBLE_EXTENSION), Some(&2));
        assert_eq!(patterns.get(NAMING_VIOLATION), Some(&2));
        assert_eq!(patterns.get(DEPENDENCY_ISSUE), Some(&2));
    }

    #[test]
    fn test_frequencies_union_streams() {
        let mut history = History::default();
        history.append(failure("security_context", "a.yaml"));
        history.append(failure("security_context", "b.yaml"));
        history.append(HistoryRecord::new("security_context", None, true, 3));
        history.append(failure("double_extension", "c.yaml.txt"));

        let table = history.frequencies();
        assert_eq!(table.get("security_context"), 3);
        assert_eq!(table.get("double_extension"), 1);
        assert_eq!(table.get("never_seen"), 0);
    }

    #[test]
    fn test_refresh_derived_execution_times() {
        let mut history = History::default();
        history.append(HistoryRecord::new("image_compliance", None, true, 10));
        history.append(HistoryRecord::new("image_compliance", None, false, 30));
        history.refresh_derived();

        assert_eq!(history.execution_times.get("image_compliance"), Some(&20.0));
    }

    #[test]
    fn test_reads_legacy_records() {
        let json = r#"{
            "ci_failures": [
                {"error_type": "naming convention", "file_path": "a.txt",
                 "timestamp": "2024-01-01T10:00:00"},
                {"issue_type": "security_context", "file_path": null, "success": false,
                 "time_taken": 5}
            ],
            "remediation_success": []
        }"#;

        let history: History = serde_json::from_str(json).unwrap();
        assert_eq!(history.ci_failures.len(), 2);
        assert_eq!(history.extract_patterns().get(NAMING_VIOLATION), Some(&1));
        assert!(history.last_updated.is_none());
    }

    #[test]
    fn test_reads_null_fields_as_defaults() {
        let json = r#"{
            "ci_failures": [
                {"issue_type": null, "file_path": "a.yaml", "success": null,
                 "time_taken": null, "timestamp": null}
            ]
        }"#;

        let history: History = serde_json::from_str(json).unwrap();
        let record = &history.ci_failures[0];
        assert_eq!(record.issue_type, "");
        assert!(!record.success);
        assert_eq!(record.time_taken, 0);
        assert_eq!(record.file_path.as_deref(), Some("a.yaml"));
    }

    #[test]
    fn test_error_message_is_not_classified() {
        let mut history = History::default();
        history.append(
            failure("security_context", "manifests/dependency-proxy.yaml")
                .with_error("naming lookup failed: dependency missing"),
        );
        history.append(
            failure("image_compliance", "deploy.yaml.txt").with_error("permission denied"),
        );

        let patterns = history.extract_patterns();
        assert_eq!(patterns.get(DOUBLE_EXTENSION), Some(&1));
        assert!(patterns.get(DEPENDENCY_ISSUE).is_none());
        assert!(patterns.get(NAMING_VIOLATION).is_none());
    }

    #[test]
    fn test_execution_times_survive_huge_durations() {
        let mut history = History::default();
        history.append(HistoryRecord::new("image_compliance", None, true, u64::MAX));
        history.append(HistoryRecord::new("image_compliance", None, false, u64::MAX));
        history.refresh_derived();

        let mean = history.execution_times["image_compliance"];
        assert!((mean - u64::MAX as f64).abs() / mean < 1e-9);
    }
}
