//! complyguard
//!
//! Scans deployment manifests against a compliance rule catalog, applies the
//! fixes it can, learns from past remediation history and writes a report.

use anyhow::Result;
use clap::Parser;
use complyguard_cli::{pipeline, Cli, Commands, GuardConfig};
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    match &cli.command {
        Commands::Scan { .. } => {
            let config = GuardConfig::load(&cli.config, &cli)?;
            info!(config = %cli.config.display(), "Configuration loaded");

            let report = pipeline::run_scan(&config)?;
            println!("Manifests scanned: {}", report.total_manifests_scanned);
            println!("Violations found:  {}", report.violations_found);
            println!("Fixes applied:     {}", report.auto_fixes_applied);
            println!("Compliance score:  {:.1}", report.compliance_score);
            for fix in report.failed_fixes() {
                println!(
                    "Failed fix: {} ({})",
                    fix.file.display(),
                    fix.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!("Report written to {}", config.report_path.display());
        }
        Commands::Predict { paths, json } => {
            let issues = pipeline::run_predict(paths)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&issues)?);
            } else if issues.is_empty() {
                println!("No blockers predicted");
            } else {
                for issue in &issues {
                    println!(
                        "[{}] {} {} (confidence {:.2}): {}",
                        issue.predicted_impact,
                        issue.issue_type,
                        issue.file_path,
                        issue.confidence,
                        issue.suggested_fix
                    );
                }
            }
        }
        Commands::Patterns => {
            let config = GuardConfig::load(&cli.config, &cli)?;
            let patterns = pipeline::failure_patterns(&config);
            println!("{}", serde_json::to_string_pretty(&patterns)?);
        }
        Commands::Version => {
            println!("complyguard {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("complyguard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("complyguard=info"))
    };

    let json_layer =
        json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
