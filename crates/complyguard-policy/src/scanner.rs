//! Manifest scanner
//!
//! Evaluates every rule family against every document. Per document the
//! checks run image → namespace labels → security context, and within a
//! check containers are visited in declared order, so output order is fully
//! determined by the input.

use complyguard_core::{DocumentRef, Error, ManifestSet, Result, Violation};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, error};

use crate::rule::RuleSet;

/// Kind of document that receives the label check
pub const NAMESPACE_KIND: &str = "Namespace";

/// A document left out of the scan because of its shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDocument {
    pub file: PathBuf,
    pub manifest_index: usize,
    pub reason: String,
}

/// Result of one scan pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    /// Violations in discovery order
    pub violations: Vec<Violation>,

    /// Malformed documents that were skipped
    pub skipped: Vec<SkippedDocument>,

    /// Number of documents visited
    pub documents_scanned: usize,
}

/// Scanner over a rule catalog
pub struct ManifestScanner<'r> {
    rules: &'r RuleSet,
}

impl<'r> ManifestScanner<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules }
    }

    /// Scan every document in order. Malformed documents are logged and
    /// skipped; the scan never aborts.
    pub fn scan(&self, manifests: &ManifestSet) -> ScanOutcome {
        let results = manifests
            .documents()
            .map(|document| (document, self.scan_document(document)));
        collect(results)
    }

    /// Same output as [`scan`](Self::scan), with documents checked on the
    /// rayon pool
    pub fn scan_parallel(&self, manifests: &ManifestSet) -> ScanOutcome {
        let documents: Vec<DocumentRef<'_>> = manifests.documents().collect();
        let results: Vec<_> = documents
            .par_iter()
            .map(|document| (*document, self.scan_document(*document)))
            .collect();
        collect(results)
    }

    /// Check a single document against all rule families
    pub fn scan_document(&self, document: DocumentRef<'_>) -> Result<Vec<Violation>> {
        let root = match document.document {
            Value::Null => return Ok(Vec::new()),
            Value::Object(root) => root,
            _ => {
                return Err(Error::manifest(
                    document.path,
                    document.index,
                    "document root is not a mapping",
                ))
            }
        };

        let containers = pod_containers(root)
            .map_err(|reason| Error::manifest(document.path, document.index, reason))?;

        let mut violations = Vec::new();

        for (position, container) in containers.iter().enumerate() {
            self.check_image(document, position, container, &mut violations);
        }

        if document.kind() == Some(NAMESPACE_KIND) {
            self.check_namespace_labels(document, root, &mut violations);
        }

        for (position, container) in containers.iter().enumerate() {
            self.check_security_context(document, position, container, &mut violations);
        }

        Ok(violations)
    }

    fn check_image(
        &self,
        document: DocumentRef<'_>,
        position: usize,
        container: &Map<String, Value>,
        violations: &mut Vec<Violation>,
    ) {
        let Some(image) = container.get("image").and_then(Value::as_str) else {
            return;
        };

        // a pattern may also match its own replacement
        let rule = self
            .rules
            .match_image(image)
            .filter(|rule| rule.target_image != image);
        if let Some(rule) = rule {
            violations.push(Violation::image(
                document.path,
                document.index,
                position,
                image,
                rule.target_image.as_str(),
                rule.risk_level,
                rule.remediation,
                rule.justification.clone(),
            ));
        }
    }

    fn check_namespace_labels(
        &self,
        document: DocumentRef<'_>,
        root: &Map<String, Value>,
        violations: &mut Vec<Violation>,
    ) {
        let labels = root
            .get("metadata")
            .and_then(|metadata| metadata.get("labels"))
            .and_then(Value::as_object);

        for (label, default_value) in self.rules.required_labels() {
            let present = labels.is_some_and(|labels| labels.contains_key(label));
            if !present {
                violations.push(Violation::missing_label(
                    document.path,
                    document.index,
                    label,
                    default_value,
                ));
            }
        }
    }

    fn check_security_context(
        &self,
        document: DocumentRef<'_>,
        position: usize,
        container: &Map<String, Value>,
        violations: &mut Vec<Violation>,
    ) {
        let context = container.get("securityContext").and_then(Value::as_object);

        for (setting, expected) in self.rules.security_settings() {
            let current = context
                .and_then(|context| context.get(&setting))
                .cloned()
                .unwrap_or(Value::Null);
            if current != expected {
                violations.push(Violation::security_context(
                    document.path,
                    document.index,
                    position,
                    setting,
                    current,
                    expected,
                ));
            }
        }
    }
}

/// Containers of the pod template, if the document has one
fn pod_containers(
    root: &Map<String, Value>,
) -> std::result::Result<Vec<&Map<String, Value>>, String> {
    let Some(template) = root.get("spec").and_then(|spec| spec.get("template")) else {
        return Ok(Vec::new());
    };

    let pod_spec = template
        .get("spec")
        .and_then(Value::as_object)
        .ok_or_else(|| "spec.template.spec is not a mapping".to_string())?;

    let containers = match pod_spec.get("containers") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(containers)) => containers,
        Some(_) => return Err("spec.template.spec.containers is not a sequence".to_string()),
    };

    containers
        .iter()
        .enumerate()
        .map(|(i, container)| {
            container
                .as_object()
                .ok_or_else(|| format!("container {} is not a mapping", i))
        })
        .collect()
}

fn collect<'a>(
    results: impl IntoIterator<Item = (DocumentRef<'a>, Result<Vec<Violation>>)>,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for (document, result) in results {
        outcome.documents_scanned += 1;
        match result {
            Ok(violations) => {
                debug!(
                    file = %document.path.display(),
                    index = document.index,
                    violations = violations.len(),
                    "Scanned document"
                );
                outcome.violations.extend(violations);
            }
            Err(e) => {
                error!(
                    file = %document.path.display(),
                    index = document.index,
                    error = %e,
                    "Skipping malformed document"
                );
                outcome.skipped.push(SkippedDocument {
                    file: document.path.to_path_buf(),
                    manifest_index: document.index,
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
}
