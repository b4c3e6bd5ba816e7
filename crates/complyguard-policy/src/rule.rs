//! Rule catalog
//!
//! Rules live in a structured document with three named blocks, each block
//! holding embedded JSON:
//!
//! ```yaml
//! data:
//!   image-replacement-rules: |
//!     {"busybox:latest": {"target": "...", "risk": "critical", "remediation": "auto"}}
//!   namespace-labeling-rules: |
//!     {"required_labels": ["team", "environment"]}
//!   security-context-rules: |
//!     {"auto_fixes": {"runAsNonRoot": true}}
//! ```
//!
//! Loading runs in two stages: [`RuleSource::parse`] reads the outer
//! document, [`RuleSource::decode`] turns each block into typed rules.
//! Either stage failing selects [`RuleSet::fallback`].

use complyguard_core::{Error, RemediationKind, Result, RiskLevel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::pattern::ImagePattern;

/// Label value used by the label fix when the catalog gives no default
pub const DEFAULT_LABEL_VALUE: &str = "unassigned";

/// Replace images matching `pattern` with `target_image`
#[derive(Debug, Clone)]
pub struct ImageRule {
    pub pattern: ImagePattern,
    pub target_image: String,
    pub risk_level: RiskLevel,
    pub remediation: RemediationKind,
    pub justification: Option<String>,
}

/// Labels a `Namespace` document must carry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelRule {
    /// Required labels in catalog order, without duplicates
    pub required_labels: Vec<String>,

    /// Value written by the label fix, per label
    pub defaults: BTreeMap<String, String>,
}

impl LabelRule {
    pub fn default_value(&self, label: &str) -> &str {
        self.defaults
            .get(label)
            .map(String::as_str)
            .unwrap_or(DEFAULT_LABEL_VALUE)
    }
}

/// Container security settings and their required values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityContextRule {
    /// Setting name to expected value, in catalog order
    pub expected: Map<String, Value>,
}

/// A single rule of one of the three families
#[derive(Debug, Clone)]
pub enum Rule {
    Image(ImageRule),
    Label(LabelRule),
    SecurityContext(SecurityContextRule),
}

/// Rule family, used with a position to identify a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    ImageReplacement,
    NamespaceLabeling,
    SecurityContext,
}

impl Rule {
    pub fn family(&self) -> RuleFamily {
        match self {
            Rule::Image(_) => RuleFamily::ImageReplacement,
            Rule::Label(_) => RuleFamily::NamespaceLabeling,
            Rule::SecurityContext(_) => RuleFamily::SecurityContext,
        }
    }
}

/// Where the active rule set came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum RuleOrigin {
    /// Decoded from a rule source file
    Loaded { path: PathBuf },

    /// Built-in minimal rules, used because loading failed
    Fallback { reason: String },
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOrigin::Loaded { path } => write!(f, "loaded from {}", path.display()),
            RuleOrigin::Fallback { reason } => write!(f, "built-in fallback ({})", reason),
        }
    }
}

/// Immutable rule catalog
#[derive(Debug, Clone)]
pub struct RuleSet {
    origin: RuleOrigin,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Rule set decoded from a source file
    pub fn loaded(path: impl Into<PathBuf>, rules: Vec<Rule>) -> Self {
        Self {
            origin: RuleOrigin::Loaded { path: path.into() },
            rules,
        }
    }

    /// Built-in minimal rule set covering one entry per family
    pub fn fallback(reason: impl Into<String>) -> Self {
        let mut security = Map::new();
        security.insert("runAsNonRoot".to_string(), Value::Bool(true));
        security.insert("allowPrivilegeEscalation".to_string(), Value::Bool(false));

        Self {
            origin: RuleOrigin::Fallback {
                reason: reason.into(),
            },
            rules: vec![
                Rule::Image(ImageRule {
                    pattern: ImagePattern::new("busybox:latest"),
                    target_image: "ghcr.io/secure-baseline/busybox:1.36-secure".to_string(),
                    risk_level: RiskLevel::Critical,
                    remediation: RemediationKind::Auto,
                    justification: None,
                }),
                Rule::Label(LabelRule {
                    required_labels: vec![
                        "team".to_string(),
                        "environment".to_string(),
                        "lifecycle".to_string(),
                    ],
                    defaults: BTreeMap::new(),
                }),
                Rule::SecurityContext(SecurityContextRule { expected: security }),
            ],
        }
    }

    /// Load rules from a source file, never failing.
    ///
    /// Any read, parse or decode error is logged and the fallback set is
    /// returned instead.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match RuleSource::read(path).and_then(|source| source.decode()) {
            Ok(rules) => {
                info!(path = %path.display(), rules = rules.len(), "Loaded rule catalog");
                Self::loaded(path, rules)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Unable to load rules, using built-in fallback"
                );
                Self::fallback(e.to_string())
            }
        }
    }

    /// Parse and decode a rule source held in memory
    pub fn from_yaml(path: impl Into<PathBuf>, yaml: &str) -> Result<Self> {
        let rules = RuleSource::parse(yaml)?.decode()?;
        Ok(Self::loaded(path, rules))
    }

    pub fn origin(&self) -> &RuleOrigin {
        &self.origin
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, RuleOrigin::Fallback { .. })
    }

    /// All rules in catalog order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Image rules in catalog order
    pub fn image_rules(&self) -> impl Iterator<Item = &ImageRule> + '_ {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Image(image) => Some(image),
            _ => None,
        })
    }

    /// First image rule whose pattern matches the reference
    pub fn match_image(&self, image: &str) -> Option<&ImageRule> {
        self.image_rules().find(|rule| rule.pattern.matches(image))
    }

    /// Required namespace labels across all label rules, in catalog order,
    /// with the value the fix should write
    pub fn required_labels(&self) -> Vec<(&str, &str)> {
        let mut labels: Vec<(&str, &str)> = Vec::new();
        for rule in &self.rules {
            if let Rule::Label(rule) = rule {
                for label in &rule.required_labels {
                    if !labels.iter().any(|(existing, _)| *existing == label.as_str()) {
                        labels.push((label.as_str(), rule.default_value(label)));
                    }
                }
            }
        }
        labels
    }

    /// Expected security settings across all security rules, in catalog
    /// order; a later rule overrides the value of an earlier one
    pub fn security_settings(&self) -> Map<String, Value> {
        let mut settings = Map::new();
        for rule in &self.rules {
            if let Rule::SecurityContext(rule) = rule {
                for (key, value) in &rule.expected {
                    settings.insert(key.clone(), value.clone());
                }
            }
        }
        settings
    }
}

/// Stage one: the outer rule document with its blocks still encoded
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSource {
    data: RuleBlocks,
}

#[derive(Debug, Clone, Deserialize)]
struct RuleBlocks {
    #[serde(rename = "image-replacement-rules")]
    image_replacement: String,

    #[serde(rename = "namespace-labeling-rules")]
    namespace_labeling: String,

    #[serde(rename = "security-context-rules")]
    security_context: String,
}

#[derive(Debug, Deserialize)]
struct ImageRuleSpec {
    target: String,
    risk: RiskLevel,
    remediation: RemediationKind,
    #[serde(default)]
    justification: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelRuleSpec {
    required_labels: Vec<String>,
    #[serde(default)]
    defaults: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SecurityRuleSpec {
    auto_fixes: Map<String, Value>,
}

impl RuleSource {
    /// Read and parse the outer document from a file
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::rules(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse the outer document
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::rules(format!("invalid rule document: {}", e)))
    }

    /// Decode every block into typed rules, in block order
    pub fn decode(&self) -> Result<Vec<Rule>> {
        let mut rules = Vec::new();

        let images: Map<String, Value> =
            decode_block("image-replacement-rules", &self.data.image_replacement)?;
        for (pattern, spec) in images {
            let spec: ImageRuleSpec = serde_json::from_value(spec).map_err(|e| {
                Error::rules(format!("image-replacement-rules: rule '{}': {}", pattern, e))
            })?;
            rules.push(Rule::Image(ImageRule {
                pattern: ImagePattern::new(pattern),
                target_image: spec.target,
                risk_level: spec.risk,
                remediation: spec.remediation,
                justification: spec.justification,
            }));
        }

        let labels: LabelRuleSpec =
            decode_block("namespace-labeling-rules", &self.data.namespace_labeling)?;
        let mut required_labels: Vec<String> = Vec::with_capacity(labels.required_labels.len());
        for label in labels.required_labels {
            if !required_labels.contains(&label) {
                required_labels.push(label);
            }
        }
        rules.push(Rule::Label(LabelRule {
            required_labels,
            defaults: labels.defaults,
        }));

        let security: SecurityRuleSpec =
            decode_block("security-context-rules", &self.data.security_context)?;
        rules.push(Rule::SecurityContext(SecurityContextRule {
            expected: security.auto_fixes,
        }));

        Ok(rules)
    }
}

fn decode_block<T: serde::de::DeserializeOwned>(name: &str, content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| Error::rules(format!("{}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RULES: &str = r#"
apiVersion: v1
kind: ConfigMap
data:
  image-replacement-rules: |
    {
      "nginx:latest": {"target": "registry.internal/nginx:1.25", "risk": "high",
                       "remediation": "auto", "justification": "pin tag"},
      "nginx:.*": {"target": "registry.internal/nginx:1.25", "risk": "medium",
                   "remediation": "manual"}
    }
  namespace-labeling-rules: |
    {"required_labels": ["team", "environment", "team"], "defaults": {"environment": "dev"}}
  security-context-rules: |
    {"auto_fixes": {"runAsNonRoot": true, "readOnlyRootFilesystem": true}}
"#;

    #[test]
    fn test_decode_preserves_catalog_order() {
        let rules = RuleSet::from_yaml("rules.yaml", RULES).unwrap();
        assert!(!rules.is_fallback());

        let patterns: Vec<_> = rules.image_rules().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["nginx:latest", "nginx:.*"]);

        let matched = rules.match_image("nginx:latest").unwrap();
        assert_eq!(matched.risk_level, RiskLevel::High);
        assert_eq!(matched.justification.as_deref(), Some("pin tag"));

        let matched = rules.match_image("nginx:1.19").unwrap();
        assert_eq!(matched.remediation, RemediationKind::Manual);
    }

    #[test]
    fn test_required_labels_deduplicated_with_defaults() {
        let rules = RuleSet::from_yaml("rules.yaml", RULES).unwrap();
        assert_eq!(
            rules.required_labels(),
            vec![("team", DEFAULT_LABEL_VALUE), ("environment", "dev")]
        );
    }

    #[test]
    fn test_security_settings_in_order() {
        let rules = RuleSet::from_yaml("rules.yaml", RULES).unwrap();
        let keys: Vec<_> = rules.security_settings().keys().cloned().collect();
        assert_eq!(keys, vec!["runAsNonRoot", "readOnlyRootFilesystem"]);
    }

    #[test]
    fn test_outer_parse_failure_is_a_rules_error() {
        let err = RuleSource::parse("data: [not, a, mapping").unwrap_err();
        assert!(matches!(err, Error::Rules(_)));
    }

    #[test]
    fn test_inner_block_failure_names_block() {
        let yaml = r#"
data:
  image-replacement-rules: "{not json"
  namespace-labeling-rules: '{"required_labels": []}'
  security-context-rules: '{"auto_fixes": {}}'
"#;
        let err = RuleSet::from_yaml("rules.yaml", yaml).unwrap_err();
        assert!(err.to_string().contains("image-replacement-rules"));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let rules = RuleSet::load("/definitely/not/here/rules.yaml");
        assert!(rules.is_fallback());
        assert_eq!(rules.image_rules().count(), 1);
        assert_eq!(rules.required_labels().len(), 3);
        assert_eq!(rules.security_settings().len(), 2);
    }

    #[test]
    fn test_load_malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "data:\n  image-replacement-rules: '[]'").unwrap();

        let rules = RuleSet::load(file.path());
        assert!(rules.is_fallback());
        assert!(rules.match_image("busybox:latest").is_some());
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();

        let rules = RuleSet::load(file.path());
        assert_eq!(
            rules.origin(),
            &RuleOrigin::Loaded {
                path: file.path().to_path_buf()
            }
        );
        assert_eq!(rules.len(), 4);
        assert_eq!(rules.rules()[2].family(), RuleFamily::NamespaceLabeling);
    }
}
