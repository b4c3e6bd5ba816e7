//! Blocker prediction from file paths
//!
//! Looks only at path strings, never at file contents. Each heuristic
//! inspects one path independently; results are ordered by impact.

use aho_corasick::AhoCorasick;
use complyguard_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub const DOUBLE_EXTENSION: &str = "double_extension";
pub const NAMING_CONVENTION: &str = "naming_convention";

/// Words that make a file look temporary
pub const TEMPORARY_WORDS: [&str; 3] = ["test", "temp", "backup"];

/// Predicted effect on the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn rank(&self) -> u8 {
        match self {
            Impact::Low => 0,
            Impact::Medium => 1,
            Impact::High => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path predicted to break the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateIssue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub file_path: String,
    pub predicted_impact: Impact,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub suggested_fix: String,
}

/// One path heuristic
pub trait BlockerHeuristic: Send + Sync {
    fn name(&self) -> &str;

    fn inspect(&self, path: &str) -> Option<CandidateIssue>;
}

/// `name.yaml.txt` style paths
pub struct DoubleExtension {
    pattern: Regex,
}

impl DoubleExtension {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"\.\w+\.txt$")
            .map_err(|e| Error::internal(format!("invalid double extension pattern: {}", e)))?;
        Ok(Self { pattern })
    }
}

impl BlockerHeuristic for DoubleExtension {
    fn name(&self) -> &str {
        DOUBLE_EXTENSION
    }

    fn inspect(&self, path: &str) -> Option<CandidateIssue> {
        if !self.pattern.is_match(file_name(path)) {
            return None;
        }

        let renamed = path.strip_suffix(".txt").unwrap_or(path);
        Some(CandidateIssue {
            issue_type: DOUBLE_EXTENSION.to_string(),
            file_path: path.to_string(),
            predicted_impact: Impact::High,
            confidence: 0.95,
            suggested_fix: renamed.to_string(),
        })
    }
}

/// Paths containing temporary-sounding words
pub struct NamingConvention {
    words: AhoCorasick,
}

impl NamingConvention {
    pub fn new() -> Result<Self> {
        let words = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(TEMPORARY_WORDS)
            .map_err(|e| Error::internal(format!("failed to build naming matcher: {}", e)))?;
        Ok(Self { words })
    }
}

impl BlockerHeuristic for NamingConvention {
    fn name(&self) -> &str {
        NAMING_CONVENTION
    }

    fn inspect(&self, path: &str) -> Option<CandidateIssue> {
        if !self.words.is_match(path) {
            return None;
        }

        Some(CandidateIssue {
            issue_type: NAMING_CONVENTION.to_string(),
            file_path: path.to_string(),
            predicted_impact: Impact::Medium,
            confidence: 0.70,
            suggested_fix: format!("rename to avoid temporary-sounding names: {}", path),
        })
    }
}

/// Runs every heuristic over a list of paths
pub struct BlockerPredictor {
    heuristics: Vec<Box<dyn BlockerHeuristic>>,
}

impl BlockerPredictor {
    /// Predictor with the built-in heuristics
    pub fn new() -> Result<Self> {
        Ok(Self::with_heuristics(vec![
            Box::new(DoubleExtension::new()?),
            Box::new(NamingConvention::new()?),
        ]))
    }

    pub fn with_heuristics(heuristics: Vec<Box<dyn BlockerHeuristic>>) -> Self {
        Self { heuristics }
    }

    pub fn heuristic_names(&self) -> Vec<&str> {
        self.heuristics.iter().map(|h| h.name()).collect()
    }

    /// Highest impact first; ties keep path order, then heuristic order
    pub fn predict<S: AsRef<str>>(&self, paths: &[S]) -> Vec<CandidateIssue> {
        let mut issues: Vec<CandidateIssue> = paths
            .iter()
            .flat_map(|path| {
                let path = path.as_ref();
                self.heuristics.iter().filter_map(move |h| h.inspect(path))
            })
            .collect();

        issues.sort_by(|a, b| b.predicted_impact.rank().cmp(&a.predicted_impact.rank()));

        debug!(paths = paths.len(), issues = issues.len(), "Predicted blockers");
        issues
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path)
}
