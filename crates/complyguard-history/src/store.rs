//! History persistence
//!
//! The whole history document lives in one JSON file, read and written
//! wholesale. Writes go to a temp file in the same directory which then
//! replaces the target, so readers never observe a partial file.
//!
//! The store is the single writer: `record` holds the write lock across the
//! read-modify-write, `load` takes the read lock.

use chrono::Utc;
use complyguard_core::{Error, Result};
use parking_lot::RwLock;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::history::{History, HistoryRecord};

/// File-backed history store
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load history. Missing or unreadable storage yields an empty history.
    pub fn load(&self) -> History {
        let _guard = self.lock.read();
        match self.read() {
            Ok(history) => history,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unable to read history, starting empty"
                );
                History::default()
            }
        }
    }

    /// Append one outcome and persist
    pub fn record(
        &self,
        issue_type: &str,
        file_path: Option<&Path>,
        success: bool,
        time_taken: u64,
    ) -> Result<()> {
        let record = HistoryRecord::new(
            issue_type,
            file_path.map(|p| p.display().to_string()),
            success,
            time_taken,
        );
        self.record_all(std::iter::once(record))
    }

    /// Append a batch of outcomes with a single persist
    pub fn record_all(&self, records: impl IntoIterator<Item = HistoryRecord>) -> Result<()> {
        let _guard = self.lock.write();

        // An unreadable file is not overwritten: that would drop its records.
        let mut history = self.read()?;
        for record in records {
            history.append(record);
        }
        self.persist(&mut history)
    }

    fn read(&self) -> Result<History> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(History::default()),
            Err(e) => {
                return Err(Error::history(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut history: History = serde_json::from_str(&content).map_err(|e| {
            Error::history(format!("cannot parse {}: {}", self.path.display(), e))
        })?;
        history.refresh_derived();
        Ok(history)
    }

    fn persist(&self, history: &mut History) -> Result<()> {
        history.last_updated = Some(Utc::now().to_rfc3339());
        history.refresh_derived();
        let json = serde_json::to_string_pretty(history)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            Error::history(format!("cannot create temp file in {}: {}", dir.display(), e))
        })?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| {
            Error::history(format!("cannot replace {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), records = history.len(), "Persisted history");
        Ok(())
    }
}
