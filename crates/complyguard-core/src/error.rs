//! Error types for complyguard

use std::path::PathBuf;

/// Result type alias using complyguard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for complyguard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rule source could not be read or decoded
    #[error("rules error: {0}")]
    Rules(String),

    /// A manifest document does not have the expected shape
    #[error("malformed manifest {path} (document {index}): {reason}")]
    Manifest {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    /// A remediation could not be applied
    #[error("remediation error: {0}")]
    Remediation(String),

    /// History could not be persisted
    #[error("history error: {0}")]
    History(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new rules error
    pub fn rules(msg: impl Into<String>) -> Self {
        Self::Rules(msg.into())
    }

    /// Create a new malformed-manifest error
    pub fn manifest(path: impl Into<PathBuf>, index: usize, reason: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            index,
            reason: reason.into(),
        }
    }

    /// Create a new remediation error
    pub fn remediation(msg: impl Into<String>) -> Self {
        Self::Remediation(msg.into())
    }

    /// Create a new history error
    pub fn history(msg: impl Into<String>) -> Self {
        Self::History(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
