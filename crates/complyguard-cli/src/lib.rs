//! complyguard command-line front end
//!
//! Wires configuration, manifest discovery and the scan pipeline around the
//! policy, history and decision crates.

pub mod cli;
pub mod config;
pub mod loader;
pub mod pipeline;

pub use cli::{Cli, Commands};
pub use config::GuardConfig;
pub use loader::ManifestLoader;
pub use pipeline::{run_predict, run_scan};
