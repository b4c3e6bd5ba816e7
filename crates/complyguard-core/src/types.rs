//! Core types for complyguard

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Severity classification attached to a rule or violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a violation can be remediated mechanically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemediationKind {
    #[default]
    Auto,
    Manual,
}

/// Kind of non-compliance a violation describes.
///
/// Unknown kinds read back from an earlier report are kept as `Other` so
/// they flow through the pipeline and fail remediation explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViolationKind {
    ImageCompliance,
    MissingNamespaceLabel,
    SecurityContext,
    Other(String),
}

impl ViolationKind {
    pub fn as_str(&self) -> &str {
        match self {
            ViolationKind::ImageCompliance => "image_compliance",
            ViolationKind::MissingNamespaceLabel => "missing_namespace_label",
            ViolationKind::SecurityContext => "security_context",
            ViolationKind::Other(other) => other,
        }
    }
}

impl From<String> for ViolationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "image_compliance" => ViolationKind::ImageCompliance,
            "missing_namespace_label" => ViolationKind::MissingNamespaceLabel,
            "security_context" => ViolationKind::SecurityContext,
            _ => ViolationKind::Other(value),
        }
    }
}

impl From<ViolationKind> for String {
    fn from(kind: ViolationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected instance of non-compliance, tied to one document and
/// optionally one container. Never mutated after the scanner creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Violation type
    #[serde(rename = "type")]
    pub kind: ViolationKind,

    /// Source file of the owning document
    pub file: PathBuf,

    /// Position of the document inside its file
    pub manifest_index: usize,

    /// Container position inside the pod template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_index: Option<usize>,

    /// Missing namespace label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Security context setting name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,

    /// Value found in the document (null when unset)
    #[serde(default)]
    pub current_value: Value,

    /// Value the rule asks for
    #[serde(default)]
    pub recommended_value: Value,

    pub risk_level: RiskLevel,

    #[serde(rename = "remediationKind")]
    pub remediation: RemediationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,

    pub auto_fixable: bool,
}

impl Violation {
    /// Container image matched an image-replacement rule
    #[allow(clippy::too_many_arguments)]
    pub fn image(
        file: impl Into<PathBuf>,
        manifest_index: usize,
        container_index: usize,
        current: impl Into<String>,
        target: impl Into<String>,
        risk_level: RiskLevel,
        remediation: RemediationKind,
        justification: Option<String>,
    ) -> Self {
        Self {
            kind: ViolationKind::ImageCompliance,
            file: file.into(),
            manifest_index,
            container_index: Some(container_index),
            label: None,
            setting: None,
            current_value: Value::String(current.into()),
            recommended_value: Value::String(target.into()),
            risk_level,
            remediation,
            justification,
            auto_fixable: remediation == RemediationKind::Auto,
        }
    }

    /// Namespace document lacks a required label
    pub fn missing_label(
        file: impl Into<PathBuf>,
        manifest_index: usize,
        label: impl Into<String>,
        default_value: impl Into<String>,
    ) -> Self {
        Self {
            kind: ViolationKind::MissingNamespaceLabel,
            file: file.into(),
            manifest_index,
            container_index: None,
            label: Some(label.into()),
            setting: None,
            current_value: Value::Null,
            recommended_value: Value::String(default_value.into()),
            risk_level: RiskLevel::Medium,
            remediation: RemediationKind::Auto,
            justification: None,
            auto_fixable: true,
        }
    }

    /// Container security setting differs from the expected value
    pub fn security_context(
        file: impl Into<PathBuf>,
        manifest_index: usize,
        container_index: usize,
        setting: impl Into<String>,
        current: Value,
        expected: Value,
    ) -> Self {
        Self {
            kind: ViolationKind::SecurityContext,
            file: file.into(),
            manifest_index,
            container_index: Some(container_index),
            label: None,
            setting: Some(setting.into()),
            current_value: current,
            recommended_value: expected,
            risk_level: RiskLevel::High,
            remediation: RemediationKind::Auto,
            justification: None,
            auto_fixable: true,
        }
    }
}

/// Strategy used to remediate a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    ImageReplacement,
    NamespaceLabelAddition,
    SecurityContextUpdate,
    Unsupported,
}

impl FixKind {
    /// Fix strategy for a violation kind
    pub fn for_violation(kind: &ViolationKind) -> Self {
        match kind {
            ViolationKind::ImageCompliance => FixKind::ImageReplacement,
            ViolationKind::MissingNamespaceLabel => FixKind::NamespaceLabelAddition,
            ViolationKind::SecurityContext => FixKind::SecurityContextUpdate,
            ViolationKind::Other(_) => FixKind::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FixKind::ImageReplacement => "image_replacement",
            FixKind::NamespaceLabelAddition => "namespace_label_addition",
            FixKind::SecurityContextUpdate => "security_context_update",
            FixKind::Unsupported => "unsupported",
        }
    }
}

/// Outcome of one remediation attempt. Failures are kept, not discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    /// Index of the violation in the remediated batch
    pub violation: usize,

    pub file: PathBuf,

    pub success: bool,

    pub fix_kind: FixKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The fix ran but the file content did not change
    #[serde(default)]
    pub no_change: bool,

    /// Where the pre-fix content was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,

    #[serde(default)]
    pub elapsed_ms: u64,
}

impl Fix {
    /// A fix that was written to disk
    pub fn applied(
        violation: usize,
        file: impl Into<PathBuf>,
        fix_kind: FixKind,
        old_value: Value,
        new_value: Value,
    ) -> Self {
        Self {
            violation,
            file: file.into(),
            success: true,
            fix_kind,
            old_value: Some(old_value),
            new_value: Some(new_value),
            error: None,
            no_change: false,
            backup_path: None,
            elapsed_ms: 0,
        }
    }

    /// A fix that could not be applied
    pub fn failed(
        violation: usize,
        file: impl Into<PathBuf>,
        fix_kind: FixKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            violation,
            file: file.into(),
            success: false,
            fix_kind,
            old_value: None,
            new_value: None,
            error: Some(error.into()),
            no_change: false,
            backup_path: None,
            elapsed_ms: 0,
        }
    }

    pub fn with_backup(mut self, backup_path: Option<PathBuf>) -> Self {
        self.backup_path = backup_path;
        self
    }

    pub fn with_no_change(mut self, no_change: bool) -> Self {
        self.no_change = no_change;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_violation_kind_round_trips_unknown() {
        let kind: ViolationKind = serde_json::from_value(json!("rbac_wildcard")).unwrap();
        assert_eq!(kind, ViolationKind::Other("rbac_wildcard".to_string()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("rbac_wildcard"));
    }

    #[test]
    fn test_violation_serializes_camel_case() {
        let violation = Violation::image(
            "manifests/app.yaml",
            0,
            1,
            "busybox:latest",
            "ghcr.io/secure-baseline/busybox:1.36-secure",
            RiskLevel::Critical,
            RemediationKind::Auto,
            None,
        );

        let value = serde_json::to_value(&violation).unwrap();
        assert_eq!(value["type"], "image_compliance");
        assert_eq!(value["manifestIndex"], 0);
        assert_eq!(value["containerIndex"], 1);
        assert_eq!(value["riskLevel"], "critical");
        assert_eq!(value["remediationKind"], "auto");
        assert_eq!(value["autoFixable"], true);
        assert!(value.get("label").is_none());
    }

    #[test]
    fn test_manual_image_rule_is_not_auto_fixable() {
        let violation = Violation::image(
            "a.yaml",
            0,
            0,
            "nginx:latest",
            "nginx:1.25",
            RiskLevel::Medium,
            RemediationKind::Manual,
            Some("pin tags".to_string()),
        );
        assert!(!violation.auto_fixable);
    }

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn test_fix_kind_dispatch() {
        assert_eq!(
            FixKind::for_violation(&ViolationKind::SecurityContext),
            FixKind::SecurityContextUpdate
        );
        assert_eq!(
            FixKind::for_violation(&ViolationKind::Other("x".into())),
            FixKind::Unsupported
        );
    }
}
