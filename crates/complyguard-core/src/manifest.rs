//! In-memory manifest model
//!
//! The parsing collaborator hands over each manifest file as its raw source
//! text plus the documents it parsed out of it. Documents keep their file
//! position so violations can point back at them; empty (`null`) documents
//! are retained for the same reason.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::Result;

/// One manifest file: raw source plus its parsed documents
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFile {
    pub path: PathBuf,
    pub source: String,
    pub documents: Vec<Value>,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>, documents: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            documents,
        }
    }

    /// Declared `kind` of a document, if any
    pub fn kind(&self, index: usize) -> Option<&str> {
        self.documents.get(index)?.get("kind")?.as_str()
    }

    /// Serialize every document back into a multi-document YAML stream.
    ///
    /// Null documents become empty documents so positions survive a re-parse.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        for (i, document) in self.documents.iter().enumerate() {
            if i > 0 {
                out.push_str("---\n");
            }
            if !document.is_null() {
                out.push_str(&serde_yaml::to_string(document)?);
            }
        }
        Ok(out)
    }
}

/// Borrowed view of one document inside a [`ManifestSet`]
#[derive(Debug, Clone, Copy)]
pub struct DocumentRef<'a> {
    pub path: &'a Path,
    pub index: usize,
    pub document: &'a Value,
}

impl DocumentRef<'_> {
    pub fn kind(&self) -> Option<&str> {
        self.document.get("kind")?.as_str()
    }
}

/// Ordered collection of manifest files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestSet {
    files: Vec<ManifestFile>,
}

impl ManifestSet {
    pub fn new(files: Vec<ManifestFile>) -> Self {
        Self { files }
    }

    pub fn push(&mut self, file: ManifestFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[ManifestFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a file by its source path
    pub fn file(&self, path: &Path) -> Option<&ManifestFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn file_mut(&mut self, path: &Path) -> Option<&mut ManifestFile> {
        self.files.iter_mut().find(|f| f.path == path)
    }

    /// All documents in file order, then document order
    pub fn documents(&self) -> impl Iterator<Item = DocumentRef<'_>> + '_ {
        self.files.iter().flat_map(|file| {
            file.documents
                .iter()
                .enumerate()
                .map(move |(index, document)| DocumentRef {
                    path: &file.path,
                    index,
                    document,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_documents_preserve_order() {
        let set = ManifestSet::new(vec![
            ManifestFile::new("a.yaml", "", vec![json!({"kind": "Namespace"}), Value::Null]),
            ManifestFile::new("b.yaml", "", vec![json!({"kind": "Deployment"})]),
        ]);

        let seen: Vec<_> = set
            .documents()
            .map(|d| (d.path.to_path_buf(), d.index))
            .collect();
        assert_eq!(
            seen,
            vec![
                (PathBuf::from("a.yaml"), 0),
                (PathBuf::from("a.yaml"), 1),
                (PathBuf::from("b.yaml"), 0),
            ]
        );
    }

    #[test]
    fn test_render_keeps_document_positions() {
        let file = ManifestFile::new(
            "ns.yaml",
            "",
            vec![
                json!({"kind": "Namespace", "metadata": {"name": "shop"}}),
                Value::Null,
                json!({"kind": "ConfigMap"}),
            ],
        );

        let rendered = file.render().unwrap();
        assert_eq!(rendered.matches("---\n").count(), 2);
        assert!(rendered.starts_with("kind: Namespace\n"));
        assert!(rendered.ends_with("kind: ConfigMap\n"));
    }

    #[test]
    fn test_kind_lookup() {
        let file = ManifestFile::new("ns.yaml", "", vec![json!({"kind": "Namespace"}), json!(3)]);
        assert_eq!(file.kind(0), Some("Namespace"));
        assert_eq!(file.kind(1), None);
        assert_eq!(file.kind(7), None);
    }
}
