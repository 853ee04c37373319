use alloy::primitives::BlockNumber;
use db::{BlockRecord, Destination, MergeReport};
use futures::{pin_mut, Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PipelineError, RunError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub batches: usize,
    pub rows: u64,
    pub first_block: Option<BlockNumber>,
    pub last_block: Option<BlockNumber>,
    pub warnings: Vec<String>,
}

impl LoadSummary {
    fn commit(&mut self, first: BlockNumber, last: BlockNumber, report: MergeReport) {
        self.batches += 1;
        self.rows += report.rows();
        self.first_block = Some(self.first_block.map_or(first, |known| known.min(first)));
        self.last_block = Some(self.last_block.map_or(last, |known| known.max(last)));
        self.warnings.extend(report.warnings);
    }
}

/// Merges every batch of `batches` into `table`, one destination call per batch,
/// in the order they arrive.
///
/// Stops at the first failure. Batches merged before it stay committed and are
/// reported in [`RunError::committed`].
pub async fn load<D, S>(destination: &D, table: &str, batches: S) -> Result<LoadSummary, RunError>
where
    D: Destination + ?Sized,
    S: Stream<Item = Result<Vec<BlockRecord>, PipelineError>>,
{
    pin_mut!(batches);
    let mut summary = LoadSummary::default();

    while let Some(batch) = batches.next().await {
        let batch = match batch {
            Ok(batch) => batch,
            Err(error) => {
                return Err(RunError {
                    committed: summary,
                    error,
                })
            }
        };
        // 1-based, matching the order batches are loaded in.
        let position = summary.batches + 1;
        let numbers = batch.iter().map(|record| record.number);
        let (first, last) = match (numbers.clone().min(), numbers.max()) {
            (Some(first), Some(last)) => (first, last),
            _ => continue,
        };

        match destination.merge(table, batch).await {
            Ok(report) => {
                for warning in &report.warnings {
                    warn!("batch {}: {}", position, warning);
                }
                info!(
                    "batch {} merged {} rows into {} (blocks {}..={})",
                    position,
                    report.rows(),
                    table,
                    first,
                    last
                );
                summary.commit(first, last, report);
            }
            Err(source) => {
                return Err(RunError {
                    committed: summary,
                    error: PipelineError::LoadError {
                        batch: position,
                        source,
                    },
                })
            }
        }
    }

    Ok(summary)
}
