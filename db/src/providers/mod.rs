pub mod memory;
pub mod provider;

pub use memory::*;
pub use provider::*;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::DestinationError;
use crate::types::{BlockRecord, LoadRecord, MergeReport};

/// A warehouse that can upsert block records keyed by block number.
///
/// Implementations must make each `merge` call atomic: either every row of
/// the call is visible afterwards or none is.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Inserts `rows` into `table`, overwriting rows whose number already exists.
    async fn merge(
        &self,
        table: &str,
        rows: Vec<BlockRecord>,
    ) -> Result<MergeReport, DestinationError>;

    /// Largest block number stored in `table`, if any.
    async fn high_water_mark(&self, table: &str) -> Result<Option<u64>, DestinationError>;

    async fn record_run(&self, record: &LoadRecord) -> Result<(), DestinationError>;
}

/// Keeps the last occurrence of every block number in `rows`, sorted by number.
pub fn collapse_duplicate_keys(rows: Vec<BlockRecord>) -> (Vec<BlockRecord>, Vec<String>) {
    let received = rows.len();
    let mut unique = BTreeMap::new();
    let mut duplicates = Vec::new();
    for row in rows {
        let number = row.number;
        if unique.insert(number, row).is_some() {
            duplicates.push(number);
        }
    }

    let mut warnings = Vec::new();
    if !duplicates.is_empty() {
        duplicates.dedup();
        warnings.push(format!(
            "batch of {} rows repeated block numbers {:?}; last occurrence kept",
            received, duplicates
        ));
    }

    (unique.into_values().collect(), warnings)
}
