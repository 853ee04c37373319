use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flat, normalized view of a single block as stored in the warehouse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub number: u64,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub size: u64,
    pub base_fee_per_gas: u64,
    pub transactions_count: u64,
    pub hash: String,
    pub parent_hash: String,
}

/// Name of the merge key column shared by every destination.
pub const MERGE_KEY: &str = "number";

/// Table that holds block records inside a dataset.
pub const BLOCKS_TABLE: &str = "blocks";

/// Outcome of a single merge call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub inserted: u64,
    pub updated: u64,
    pub warnings: Vec<String>,
}

impl MergeReport {
    pub fn rows(&self) -> u64 {
        self.inserted + self.updated
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Bookkeeping entry written once per pipeline run.
///
/// The block span is `None` when the run failed before a range was planned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRecord {
    pub dataset: String,
    pub first_block: Option<u64>,
    pub last_block: Option<u64>,
    pub batches: u64,
    pub rows: u64,
    pub status: RunStatus,
    pub error: Option<String>,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
}

/// Returns true when `name` can be used unquoted as a Postgres schema name.
pub fn is_valid_dataset_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
