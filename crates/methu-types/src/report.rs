use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one Sync Engine pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub expected: usize,
    pub missing: usize,
    pub downloaded: usize,
    pub failed: Vec<String>,
}

/// Outcome of one successful Gif Assembler pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub frames: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssemblyOutcome {
    /// Nothing new was downloaded, the previous artifact still stands.
    Debounced,
    Built(AssemblyReport),
    Failed { reason: String },
}

/// Everything one scheduler cycle did, published to the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub anchor_date: NaiveDate,
    pub sync: SyncReport,
    pub assembly: AssemblyOutcome,
}
