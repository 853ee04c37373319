use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::error::DestinationError;
use crate::providers::{collapse_duplicate_keys, Destination};
use crate::types::{BlockRecord, LoadRecord, MergeReport};

/// One observed `merge` call: target table and the block numbers it carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeCall {
    pub table: String,
    pub numbers: Vec<u64>,
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, BTreeMap<u64, BlockRecord>>,
    merges: Vec<MergeCall>,
    runs: Vec<LoadRecord>,
}

/// In-process destination with the same merge semantics as the warehouse.
/// Backs `--dry-run`.
#[derive(Default)]
pub struct MemoryProvider {
    state: Mutex<MemoryState>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self, table: &str) -> Vec<BlockRecord> {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn merge_calls(&self) -> Vec<MergeCall> {
        self.state.lock().await.merges.clone()
    }

    pub async fn runs(&self) -> Vec<LoadRecord> {
        self.state.lock().await.runs.clone()
    }
}

#[async_trait]
impl Destination for MemoryProvider {
    async fn merge(
        &self,
        table: &str,
        rows: Vec<BlockRecord>,
    ) -> Result<MergeReport, DestinationError> {
        let mut state = self.state.lock().await;
        state.merges.push(MergeCall {
            table: table.to_string(),
            numbers: rows.iter().map(|row| row.number).collect(),
        });

        let (rows, warnings) = collapse_duplicate_keys(rows);
        let stored = state.tables.entry(table.to_string()).or_default();
        let mut report = MergeReport {
            warnings,
            ..Default::default()
        };
        for row in rows {
            match stored.insert(row.number, row) {
                Some(_) => report.updated += 1,
                None => report.inserted += 1,
            }
        }

        Ok(report)
    }

    async fn high_water_mark(&self, table: &str) -> Result<Option<u64>, DestinationError> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .get(table)
            .and_then(|rows| rows.keys().next_back().copied()))
    }

    async fn record_run(&self, record: &LoadRecord) -> Result<(), DestinationError> {
        self.state.lock().await.runs.push(record.clone());
        Ok(())
    }
}
