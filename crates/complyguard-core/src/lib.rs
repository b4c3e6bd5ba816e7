//! complyguard core
//!
//! Core types shared across the complyguard components.
//!
//! This crate provides:
//! - The violation and fix records exchanged between scanner, planner,
//!   remediator and report
//! - The in-memory manifest model handed over by the parsing collaborator
//! - Error types and result handling

pub mod error;
pub mod manifest;
pub mod types;

pub use error::{Error, Result};
pub use manifest::{DocumentRef, ManifestFile, ManifestSet};
pub use types::{Fix, FixKind, RemediationKind, RiskLevel, Violation, ViolationKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::manifest::{DocumentRef, ManifestFile, ManifestSet};
    pub use crate::types::{Fix, FixKind, RemediationKind, RiskLevel, Violation, ViolationKind};
}
