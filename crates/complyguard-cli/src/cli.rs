use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "complyguard")]
#[command(
    author,
    version,
    about = "Policy-driven compliance scanning and remediation for deployment manifests"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "complyguard.yaml")]
    pub config: PathBuf,

    /// Directory holding the manifests to scan
    #[arg(short, long, global = true, env = "COMPLYGUARD_MANIFESTS")]
    pub manifests: Option<PathBuf>,

    /// Rule source file
    #[arg(short, long, global = true, env = "COMPLYGUARD_RULES")]
    pub rules: Option<PathBuf>,

    /// History file
    #[arg(long, global = true, env = "COMPLYGUARD_HISTORY")]
    pub history: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan manifests, remediate what can be fixed and write a report
    Scan {
        /// Report violations without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Scan documents on the rayon thread pool
        #[arg(long)]
        parallel: bool,

        /// Report output path
        #[arg(short = 'o', long)]
        report: Option<PathBuf>,
    },

    /// Predict which file paths are likely to break the pipeline
    Predict {
        /// Candidate file paths
        #[arg(required = true)]
        paths: Vec<String>,

        /// Print the predictions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show failure patterns extracted from history
    Patterns,

    /// Print version information
    Version,
}
