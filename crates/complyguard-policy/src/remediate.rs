//! Auto-remediation
//!
//! Applies fixes for auto-fixable violations, one [`Fix`] per attempt:
//! - Image violations: textual substitution in the file source
//! - Namespace label and security context violations: edit the parsed
//!   document and re-serialize the whole file
//!
//! Every write is preceded by a backup of the file's on-disk content to
//! `<name>.backup`. The first write to a file within one `remediate` call
//! creates the backup; later writes in the same call keep it, so the backup
//! always holds the pre-batch state. Failures never abort the batch.

use complyguard_core::{
    Error, Fix, FixKind, ManifestFile, ManifestSet, Result, Violation, ViolationKind,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::fs::{backup_path, FileLocks, LocalFs, ManifestFs};
use crate::rule::DEFAULT_LABEL_VALUE;

/// Applies fixes through a [`ManifestFs`]
pub struct AutoRemediator<F = LocalFs> {
    fs: F,
    locks: FileLocks,
}

impl AutoRemediator<LocalFs> {
    /// Remediator writing to the local filesystem
    pub fn new() -> Self {
        Self::with_fs(LocalFs)
    }
}

impl Default for AutoRemediator<LocalFs> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ManifestFs> AutoRemediator<F> {
    pub fn with_fs(fs: F) -> Self {
        Self {
            fs,
            locks: FileLocks::new(),
        }
    }

    /// Remediate every auto-fixable violation, in order.
    ///
    /// `Fix::violation` is the position of the violation in `violations`.
    /// The documents in `manifests` are kept in step with what was written.
    pub fn remediate(&self, violations: &[Violation], manifests: &mut ManifestSet) -> Vec<Fix> {
        let mut backed_up = HashSet::new();

        violations
            .iter()
            .enumerate()
            .filter(|(_, violation)| violation.auto_fixable)
            .map(|(index, violation)| self.apply(index, violation, manifests, &mut backed_up))
            .collect()
    }

    fn apply(
        &self,
        index: usize,
        violation: &Violation,
        manifests: &mut ManifestSet,
        backed_up: &mut HashSet<PathBuf>,
    ) -> Fix {
        let start = Instant::now();
        let fix_kind = FixKind::for_violation(&violation.kind);

        let result = match &violation.kind {
            ViolationKind::ImageCompliance => {
                self.fix_image(index, violation, manifests, backed_up)
            }
            ViolationKind::MissingNamespaceLabel => {
                let label = violation.label.clone();
                let value = match &violation.recommended_value {
                    Value::Null => Value::String(DEFAULT_LABEL_VALUE.to_string()),
                    value => value.clone(),
                };
                self.fix_structural(index, violation, manifests, backed_up, |document| {
                    let label =
                        label.ok_or_else(|| Error::remediation("violation names no label"))?;
                    add_label(document, label, value)
                })
            }
            ViolationKind::SecurityContext => {
                let setting = violation.setting.clone();
                let container = violation.container_index;
                let value = violation.recommended_value.clone();
                self.fix_structural(index, violation, manifests, backed_up, |document| {
                    let setting =
                        setting.ok_or_else(|| Error::remediation("violation names no setting"))?;
                    let container = container
                        .ok_or_else(|| Error::remediation("violation names no container"))?;
                    set_security_setting(document, container, setting, value)
                })
            }
            ViolationKind::Other(kind) => Err(Error::remediation(format!(
                "unsupported violation type: {}",
                kind
            ))),
        };

        let mut fix = match result {
            Ok(fix) => fix,
            Err(e) => Fix::failed(index, &violation.file, fix_kind, e.to_string()),
        };
        fix.elapsed_ms = start.elapsed().as_millis() as u64;

        if fix.success {
            info!(
                file = %violation.file.display(),
                kind = %violation.kind,
                no_change = fix.no_change,
                "Applied fix"
            );
        } else {
            warn!(
                file = %violation.file.display(),
                kind = %violation.kind,
                error = fix.error.as_deref().unwrap_or_default(),
                "Fix failed"
            );
        }

        fix
    }

    fn fix_image(
        &self,
        index: usize,
        violation: &Violation,
        manifests: &mut ManifestSet,
        backed_up: &mut HashSet<PathBuf>,
    ) -> Result<Fix> {
        let path = violation.file.as_path();
        let old = violation
            .current_value
            .as_str()
            .ok_or_else(|| Error::remediation("violation has no current image"))?;
        let new = violation
            .recommended_value
            .as_str()
            .ok_or_else(|| Error::remediation("violation has no recommended image"))?;

        let lock = self.locks.lock_for(path);
        let _guard = lock.lock();

        let content = self.read(path)?;
        let fixed = content.replace(old, new);
        let fix = Fix::applied(
            index,
            path,
            FixKind::ImageReplacement,
            violation.current_value.clone(),
            violation.recommended_value.clone(),
        );

        if fixed == content {
            warn!(
                file = %path.display(),
                image = old,
                "Image reference not found in source, content unchanged"
            );
            return Ok(fix.with_no_change(true));
        }

        let backup = self.write_with_backup(path, &content, &fixed, backed_up)?;

        if let Some(file) = manifests.file_mut(path) {
            replace_images(&mut file.documents, old, new);
            file.source = fixed;
        }

        Ok(fix.with_backup(Some(backup)))
    }

    fn fix_structural(
        &self,
        index: usize,
        violation: &Violation,
        manifests: &mut ManifestSet,
        backed_up: &mut HashSet<PathBuf>,
        edit: impl FnOnce(&mut Value) -> Result<()>,
    ) -> Result<Fix> {
        let path = violation.file.as_path();

        let lock = self.locks.lock_for(path);
        let _guard = lock.lock();

        let file = manifests.file_mut(path).ok_or_else(|| {
            Error::remediation(format!("{} is not part of the manifest set", path.display()))
        })?;

        let mut candidate: ManifestFile = file.clone();
        let document = candidate
            .documents
            .get_mut(violation.manifest_index)
            .ok_or_else(|| {
                Error::remediation(format!(
                    "{} has no document {}",
                    path.display(),
                    violation.manifest_index
                ))
            })?;
        edit(document)?;

        let fix = Fix::applied(
            index,
            path,
            FixKind::for_violation(&violation.kind),
            violation.current_value.clone(),
            violation.recommended_value.clone(),
        );

        // The file keeps its original formatting when the edit is a no-op
        if candidate.documents.get(violation.manifest_index)
            == file.documents.get(violation.manifest_index)
        {
            warn!(
                file = %path.display(),
                kind = %violation.kind,
                "Fix already present, document unchanged"
            );
            return Ok(fix.with_no_change(true));
        }

        let rendered = candidate.render()?;
        let on_disk = self.read(path)?;

        if rendered == on_disk {
            warn!(
                file = %path.display(),
                kind = %violation.kind,
                "Fix already present, content unchanged"
            );
            candidate.source = rendered;
            *file = candidate;
            return Ok(fix.with_no_change(true));
        }

        let backup = self.write_with_backup(path, &on_disk, &rendered, backed_up)?;
        candidate.source = rendered;
        *file = candidate;

        Ok(fix.with_backup(Some(backup)))
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.fs
            .read_to_string(path)
            .map_err(|e| Error::remediation(format!("cannot read {}: {}", path.display(), e)))
    }

    /// Back up `previous` (once per batch), then write `next`
    fn write_with_backup(
        &self,
        path: &Path,
        previous: &str,
        next: &str,
        backed_up: &mut HashSet<PathBuf>,
    ) -> Result<PathBuf> {
        let backup = backup_path(path);

        if !backed_up.contains(path) {
            self.fs.write(&backup, previous).map_err(|e| {
                Error::remediation(format!("cannot write backup {}: {}", backup.display(), e))
            })?;
            backed_up.insert(path.to_path_buf());
            debug!(file = %path.display(), backup = %backup.display(), "Backed up manifest");
        }

        self.fs.write(path, next).map_err(|e| {
            Error::remediation(format!(
                "cannot write {}: {} (previous content kept in {})",
                path.display(),
                e,
                backup.display()
            ))
        })?;

        Ok(backup)
    }
}

fn containers_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    document
        .pointer_mut("/spec/template/spec/containers")
        .and_then(Value::as_array_mut)
}

/// Mirror a textual image substitution in the parsed documents
fn replace_images(documents: &mut [Value], old: &str, new: &str) {
    for document in documents.iter_mut() {
        let Some(containers) = containers_mut(document) else {
            continue;
        };
        for container in containers.iter_mut() {
            if let Some(image) = container.get_mut("image") {
                let replaced = image
                    .as_str()
                    .filter(|current| current.contains(old))
                    .map(|current| current.replace(old, new));
                if let Some(replaced) = replaced {
                    *image = Value::String(replaced);
                }
            }
        }
    }
}

fn add_label(document: &mut Value, label: String, value: Value) -> Result<()> {
    let root = document
        .as_object_mut()
        .ok_or_else(|| Error::remediation("document root is not a mapping"))?;

    let metadata = root
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    if metadata.is_null() {
        *metadata = Value::Object(Map::new());
    }
    let metadata = metadata
        .as_object_mut()
        .ok_or_else(|| Error::remediation("metadata is not a mapping"))?;

    let labels = metadata
        .entry("labels")
        .or_insert_with(|| Value::Object(Map::new()));
    if labels.is_null() {
        *labels = Value::Object(Map::new());
    }
    let labels = labels
        .as_object_mut()
        .ok_or_else(|| Error::remediation("metadata.labels is not a mapping"))?;

    // an existing value wins over the default
    labels.entry(label).or_insert(value);
    Ok(())
}

fn set_security_setting(
    document: &mut Value,
    container: usize,
    setting: String,
    value: Value,
) -> Result<()> {
    let containers = containers_mut(document)
        .ok_or_else(|| Error::remediation("document has no pod template containers"))?;
    let container = containers
        .get_mut(container)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::remediation(format!("container {} not found", container)))?;

    let context = container
        .entry("securityContext")
        .or_insert_with(|| Value::Object(Map::new()));
    if !context.is_object() {
        *context = Value::Object(Map::new());
    }
    if let Value::Object(context) = context {
        context.insert(setting, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use complyguard_core::{RemediationKind, RiskLevel};
    use serde::Deserialize;
    use serde_json::json;
    use std::io;

    const DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
      - name: web
        image: busybox:latest
";

    fn parse(path: &Path) -> ManifestFile {
        let source = std::fs::read_to_string(path).unwrap();
        let documents = serde_yaml::Deserializer::from_str(&source)
            .map(|document| Value::deserialize(document).unwrap())
            .collect();
        ManifestFile::new(path, source, documents)
    }

    fn image_violation(path: &Path) -> Violation {
        Violation::image(
            path,
            0,
            0,
            "busybox:latest",
            "ghcr.io/secure-baseline/busybox:1.36-secure",
            RiskLevel::Critical,
            RemediationKind::Auto,
            None,
        )
    }

    /// Fails every write that is not a backup
    struct FailingTargetFs;

    impl ManifestFs for FailingTargetFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            std::fs::read_to_string(path)
        }

        fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
            if path.to_string_lossy().ends_with(crate::fs::BACKUP_SUFFIX) {
                std::fs::write(path, contents)
            } else {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only target"))
            }
        }
    }

    /// Fails every write
    struct ReadOnlyFs;

    impl ManifestFs for ReadOnlyFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            std::fs::read_to_string(path)
        }

        fn write(&self, _path: &Path, _contents: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_image_fix_backs_up_then_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let fixes = AutoRemediator::new().remediate(&[image_violation(&path)], &mut manifests);

        assert_eq!(fixes.len(), 1);
        let fix = &fixes[0];
        assert!(fix.success);
        assert!(!fix.no_change);
        assert_eq!(fix.fix_kind, FixKind::ImageReplacement);

        let backup = dir.path().join("web.yaml.backup");
        assert_eq!(fix.backup_path.as_deref(), Some(backup.as_path()));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), DEPLOYMENT);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("image: ghcr.io/secure-baseline/busybox:1.36-secure"));
        assert!(!written.contains("busybox:latest"));

        let file = manifests.file(&path).unwrap();
        assert_eq!(file.source, written);
        assert_eq!(
            file.documents[0].pointer("/spec/template/spec/containers/0/image"),
            Some(&json!("ghcr.io/secure-baseline/busybox:1.36-secure"))
        );
    }

    #[test]
    fn test_failed_write_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let fixes = AutoRemediator::with_fs(FailingTargetFs)
            .remediate(&[image_violation(&path)], &mut manifests);

        assert!(!fixes[0].success);
        assert!(fixes[0].error.as_deref().unwrap().contains("read-only target"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("web.yaml.backup")).unwrap(),
            DEPLOYMENT
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEPLOYMENT);
        assert_eq!(manifests.file(&path).unwrap().source, DEPLOYMENT);
    }

    #[test]
    fn test_failed_backup_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let fixes = AutoRemediator::with_fs(ReadOnlyFs)
            .remediate(&[image_violation(&path)], &mut manifests);

        assert!(!fixes[0].success);
        assert!(fixes[0].error.as_deref().unwrap().contains("backup"));
        assert!(!dir.path().join("web.yaml.backup").exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEPLOYMENT);
    }

    #[test]
    fn test_missing_reference_is_reported_as_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT.replace("busybox:latest", "busybox:1.36")).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let fixes = AutoRemediator::new().remediate(&[image_violation(&path)], &mut manifests);

        assert!(fixes[0].success);
        assert!(fixes[0].no_change);
        assert!(fixes[0].backup_path.is_none());
        assert!(!dir.path().join("web.yaml.backup").exists());
    }

    #[test]
    fn test_unsupported_type_fails_without_aborting_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let mut unknown = image_violation(&path);
        unknown.kind = ViolationKind::Other("rbac_wildcard".to_string());

        let fixes =
            AutoRemediator::new().remediate(&[unknown, image_violation(&path)], &mut manifests);

        assert_eq!(fixes.len(), 2);
        assert!(!fixes[0].success);
        assert_eq!(fixes[0].fix_kind, FixKind::Unsupported);
        assert!(fixes[0].error.as_deref().unwrap().contains("rbac_wildcard"));
        assert!(fixes[1].success);
        assert_eq!(fixes[1].violation, 1);
    }

    #[test]
    fn test_manual_violations_are_not_attempted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let mut manual = image_violation(&path);
        manual.auto_fixable = false;

        let fixes = AutoRemediator::new().remediate(&[manual], &mut manifests);
        assert!(fixes.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEPLOYMENT);
    }

    #[test]
    fn test_label_fix_reserializes_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.yaml");
        let original = "\
kind: Namespace
metadata:
  name: shop
  labels:
    environment: prod
";
        std::fs::write(&path, original).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let violation = Violation::missing_label(&path, 0, "team", "platform");
        let fixes = AutoRemediator::new().remediate(&[violation], &mut manifests);

        assert!(fixes[0].success);
        assert_eq!(fixes[0].fix_kind, FixKind::NamespaceLabelAddition);

        let reparsed = parse(&path);
        assert_eq!(
            reparsed.documents[0]["metadata"]["labels"],
            json!({"environment": "prod", "team": "platform"})
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("ns.yaml.backup")).unwrap(),
            original
        );
    }

    #[test]
    fn test_stale_structural_fix_leaves_hand_formatted_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        // quoting and comments the renderer would not reproduce
        let original = "\
# owned by platform
kind: Namespace
metadata:
  name: 'shop'
  labels: {team: \"checkout\"}
---
kind: Deployment
spec:
  template:
    spec:
      containers:
      - name: web
        image: \"busybox:1.36\"
        securityContext: {runAsNonRoot: true}
";
        std::fs::write(&path, original).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let violations = vec![
            Violation::missing_label(&path, 0, "team", "unassigned"),
            Violation::security_context(&path, 1, 0, "runAsNonRoot", Value::Null, json!(true)),
        ];
        let fixes = AutoRemediator::new().remediate(&violations, &mut manifests);

        assert_eq!(fixes.len(), 2);
        assert!(fixes.iter().all(|fix| fix.success && fix.no_change), "{:?}", fixes);
        assert!(fixes.iter().all(|fix| fix.backup_path.is_none()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert!(!dir.path().join("web.yaml.backup").exists());
        assert_eq!(manifests.file(&path).unwrap().source, original);
    }

    #[test]
    fn test_security_fix_creates_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let violation =
            Violation::security_context(&path, 0, 0, "runAsNonRoot", Value::Null, json!(true));
        let fixes = AutoRemediator::new().remediate(&[violation], &mut manifests);

        assert!(fixes[0].success);
        let reparsed = parse(&path);
        assert_eq!(
            reparsed.documents[0].pointer("/spec/template/spec/containers/0/securityContext"),
            Some(&json!({"runAsNonRoot": true}))
        );
    }

    #[test]
    fn test_security_fix_for_missing_container_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let violation =
            Violation::security_context(&path, 0, 4, "runAsNonRoot", Value::Null, json!(true));
        let fixes = AutoRemediator::new().remediate(&[violation], &mut manifests);

        assert!(!fixes[0].success);
        assert!(fixes[0].error.as_deref().unwrap().contains("container 4"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEPLOYMENT);
    }

    #[test]
    fn test_mixed_fixes_on_one_file_keep_original_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yaml");
        std::fs::write(&path, DEPLOYMENT).unwrap();
        let mut manifests = ManifestSet::new(vec![parse(&path)]);

        let violations = vec![
            image_violation(&path),
            Violation::security_context(
                &path,
                0,
                0,
                "allowPrivilegeEscalation",
                Value::Null,
                json!(false),
            ),
        ];
        let fixes = AutoRemediator::new().remediate(&violations, &mut manifests);

        assert!(fixes.iter().all(|fix| fix.success && !fix.no_change));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("web.yaml.backup")).unwrap(),
            DEPLOYMENT
        );

        let reparsed = parse(&path);
        let container = reparsed.documents[0]
            .pointer("/spec/template/spec/containers/0")
            .unwrap();
        assert_eq!(container["image"], "ghcr.io/secure-baseline/busybox:1.36-secure");
        assert_eq!(container["securityContext"]["allowPrivilegeEscalation"], false);
    }
}
