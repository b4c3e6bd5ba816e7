//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands};

/// complyguard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Directory scanned recursively for manifests
    #[serde(default = "default_manifests_dir")]
    pub manifests_dir: PathBuf,

    /// Rule source file
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,

    /// Remediation history file
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Where the JSON report is written
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    /// Apply auto-fixes after scanning
    #[serde(default = "default_true")]
    pub auto_remediate: bool,

    #[serde(default)]
    pub parallel_scan: bool,

    /// File extensions treated as manifests, without the dot
    #[serde(default = "default_extensions")]
    pub manifest_extensions: Vec<String>,
}

impl GuardConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &Path, cli: &Cli) -> anyhow::Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Some(manifests) = &cli.manifests {
            config.manifests_dir = manifests.clone();
        }
        if let Some(rules) = &cli.rules {
            config.rules_path = rules.clone();
        }
        if let Some(history) = &cli.history {
            config.history_path = history.clone();
        }

        if let Commands::Scan {
            dry_run,
            parallel,
            report,
        } = &cli.command
        {
            if *dry_run {
                config.auto_remediate = false;
            }
            if *parallel {
                config.parallel_scan = true;
            }
            if let Some(report) = report {
                config.report_path = report.clone();
            }
        }

        Ok(config)
    }

    /// Configuration rooted at `dir`, for embedding and tests
    pub fn rooted_at(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let defaults = Self::default();
        Self {
            manifests_dir: dir.join(defaults.manifests_dir),
            rules_path: dir.join(defaults.rules_path),
            history_path: dir.join(defaults.history_path),
            report_path: dir.join(defaults.report_path),
            ..defaults
        }
    }

    /// Whether a path has one of the manifest extensions
    pub fn is_manifest(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.manifest_extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            manifests_dir: default_manifests_dir(),
            rules_path: default_rules_path(),
            history_path: default_history_path(),
            report_path: default_report_path(),
            auto_remediate: true,
            parallel_scan: false,
            manifest_extensions: default_extensions(),
        }
    }
}

fn default_manifests_dir() -> PathBuf {
    PathBuf::from("manifests")
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("skills/compliance-automation/policy-intelligence-rules.yaml")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("compliance-history.json")
}

fn default_report_path() -> PathBuf {
    PathBuf::from("compliance-report.json")
}

fn default_extensions() -> Vec<String> {
    vec!["yaml".to_string(), "yml".to_string()]
}

fn default_true() -> bool {
    true
}
