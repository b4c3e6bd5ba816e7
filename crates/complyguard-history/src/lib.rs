//! complyguard history
//!
//! Learning from past remediation outcomes.
//!
//! Provides:
//! - An append-only log of failures and successes
//! - Failure pattern extraction and per-type frequency tables
//! - A single-writer, file-backed store with atomic replacement

pub mod history;
pub mod store;

pub use history::{FrequencyTable, History, HistoryRecord};
pub use store::HistoryStore;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::history::{FrequencyTable, History, HistoryRecord};
    pub use crate::store::HistoryStore;
}
