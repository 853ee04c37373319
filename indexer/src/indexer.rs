use chrono::{NaiveDateTime, Utc};
use db::{Destination, LoadRecord, MemoryProvider, RunStatus, WarehouseProvider, BLOCKS_TABLE};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::IndexerConfig;
use crate::error::{PipelineError, RunError, SetupError};
use crate::extract::extract;
use crate::load::{load, LoadSummary};
use crate::planner::{plan, BlockRange, WindowPolicy};
use crate::rpc::{HttpTransport, RpcClient, Transport};

/// One configured pipeline: node client on one side, warehouse on the other.
pub struct Indexer<T> {
    config: IndexerConfig,
    client: RpcClient<T>,
    destination: Arc<dyn Destination>,
}

impl Indexer<HttpTransport> {
    pub async fn from_config(config: IndexerConfig, dry_run: bool) -> Result<Self, SetupError> {
        config.validate()?;
        let transport = HttpTransport::new(&config.rpc_url, config.request_timeout())?;

        let destination: Arc<dyn Destination> = if dry_run {
            info!("dry run: loading into memory");
            Arc::new(MemoryProvider::new())
        } else {
            Arc::new(WarehouseProvider::new(&config.dataset_name).await?)
        };

        Ok(Self::new(config, RpcClient::new(transport), destination))
    }
}

impl<T: Transport> Indexer<T> {
    pub fn new(
        config: IndexerConfig,
        client: RpcClient<T>,
        destination: Arc<dyn Destination>,
    ) -> Self {
        Self {
            config,
            client,
            destination,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn client(&self) -> &RpcClient<T> {
        &self.client
    }

    /// Plans the window, then extracts and merges it batch by batch.
    ///
    /// Every run is recorded with the destination, including one that fails
    /// before a range is known.
    pub async fn run(&self) -> Result<LoadSummary, RunError> {
        let started_at = Utc::now().naive_utc();

        let (range, outcome) = match self.plan_range().await {
            Ok(range) => {
                let batches = extract(
                    &self.client,
                    range,
                    self.config.batch_size,
                    self.config.max_concurrent_requests,
                );
                let outcome = load(self.destination.as_ref(), BLOCKS_TABLE, batches).await;
                (Some(range), outcome)
            }
            Err(error) => (
                None,
                Err(RunError {
                    committed: LoadSummary::default(),
                    error,
                }),
            ),
        };

        self.record_run(range, started_at, &outcome).await;
        outcome
    }

    async fn plan_range(&self) -> Result<BlockRange, PipelineError> {
        let high_water_mark = match self.config.window_policy {
            WindowPolicy::Trailing => None,
            WindowPolicy::Resume => self
                .destination
                .high_water_mark(BLOCKS_TABLE)
                .await
                .map_err(PipelineError::DestinationError)?,
        };

        plan(
            &self.client,
            self.config.window_size,
            self.config.window_policy,
            high_water_mark,
        )
        .await
    }

    async fn record_run(
        &self,
        range: Option<BlockRange>,
        started_at: NaiveDateTime,
        outcome: &Result<LoadSummary, RunError>,
    ) {
        let (summary, status, error) = match outcome {
            Ok(summary) => (summary, RunStatus::Completed, None),
            Err(failure) => (
                &failure.committed,
                RunStatus::Failed,
                Some(failure.error.to_string()),
            ),
        };

        let record = LoadRecord {
            dataset: self.config.dataset_name.clone(),
            first_block: range.map(|range| range.start),
            last_block: range.map(|range| range.end),
            batches: summary.batches as u64,
            rows: summary.rows,
            status,
            error,
            started_at,
            finished_at: Utc::now().naive_utc(),
        };

        if let Err(e) = self.destination.record_run(&record).await {
            warn!("failed to record run for {}: {}", record.dataset, e);
        }
    }
}
