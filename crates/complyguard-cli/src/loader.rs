//! Manifest discovery and parsing

use complyguard_core::{Error, ManifestFile, ManifestSet, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::config::GuardConfig;

/// Finds manifest files under a directory and parses them
#[derive(Debug, Clone)]
pub struct ManifestLoader<'c> {
    config: &'c GuardConfig,
}

impl<'c> ManifestLoader<'c> {
    pub fn new(config: &'c GuardConfig) -> Self {
        Self { config }
    }

    /// Manifest files under `root`, sorted by path
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            warn!(dir = %root.display(), "Manifest directory not found");
            return Vec::new();
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.config.is_manifest(path))
            .collect();

        paths.sort();
        paths
    }

    /// Load every manifest under `root`; files that fail to parse are skipped
    pub fn load(&self, root: &Path) -> ManifestSet {
        let mut manifests = ManifestSet::default();

        for path in self.discover(root) {
            match load_file(&path) {
                Ok(file) => {
                    debug!(
                        file = %path.display(),
                        documents = file.documents.len(),
                        "Loaded manifest"
                    );
                    manifests.push(file);
                }
                Err(e) => error!(file = %path.display(), error = %e, "Skipping manifest file"),
            }
        }

        manifests
    }
}

/// Read and parse one manifest file
pub fn load_file(path: &Path) -> Result<ManifestFile> {
    let source = std::fs::read_to_string(path)?;
    parse_manifest(path, source)
}

/// Parse a multi-document YAML source; document order is file order
pub fn parse_manifest(path: &Path, source: String) -> Result<ManifestFile> {
    let documents = serde_yaml::Deserializer::from_str(&source)
        .enumerate()
        .map(|(index, document)| {
            Value::deserialize(document).map_err(|e| Error::manifest(path, index, e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ManifestFile::new(path, source, documents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multi_document() {
        let source = "kind: Namespace\nmetadata:\n  name: a\n---\nkind: Deployment\n".to_string();
        let file = parse_manifest(Path::new("m.yaml"), source).unwrap();

        assert_eq!(file.documents.len(), 2);
        assert_eq!(file.kind(0), Some("Namespace"));
        assert_eq!(file.kind(1), Some("Deployment"));
    }

    #[test]
    fn test_parse_error_names_document() {
        let source = "kind: Namespace\n---\nkind: [unclosed\n".to_string();
        let err = parse_manifest(Path::new("bad.yaml"), source).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b/svc.yml"), "kind: Service\n").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "kind: Namespace\n").unwrap();
        std::fs::write(dir.path().join("a.yaml.backup"), "kind: Namespace\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let config = GuardConfig::default();
        let paths = ManifestLoader::new(&config).discover(dir.path());

        assert_eq!(paths, vec![dir.path().join("a.yaml"), dir.path().join("b/svc.yml")]);
    }

    #[test]
    fn test_load_skips_unparseable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.yaml"), "kind: Namespace\n").unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "kind: [unclosed\n").unwrap();

        let config = GuardConfig::default();
        let manifests = ManifestLoader::new(&config).load(dir.path());

        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests.files()[0].path, dir.path().join("good.yaml"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let config = GuardConfig::default();
        let manifests = ManifestLoader::new(&config).load(Path::new("/nonexistent/manifests"));
        assert!(manifests.is_empty());
    }
}
