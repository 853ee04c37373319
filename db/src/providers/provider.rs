use async_trait::async_trait;
use diesel::dsl::{max, sql};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_types::Bool;
use diesel::upsert::excluded;
use diesel_async::pooled_connection::deadpool::Object;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use tracing::{debug, info};

use crate::error::DestinationError;
use crate::models::{BlockModel, NewLoadModel};
use crate::providers::{collapse_duplicate_keys, Destination};
use crate::schema::blocks::dsl as blocks_schema;
use crate::schema::pipeline_loads::dsl::pipeline_loads as pipeline_loads_schema;
use crate::types::{is_valid_dataset_name, LoadRecord, MergeReport, BLOCKS_TABLE, MERGE_KEY};
use crate::{BlockRecord, DatabaseConnections};

/// Postgres warehouse. Every dataset is a schema holding its own `blocks` table.
#[derive(Clone)]
pub struct WarehouseProvider {
    pub dbc: DatabaseConnections,
    dataset: String,
}

impl WarehouseProvider {
    pub async fn new(dataset: &str) -> Result<Self, DestinationError> {
        if !is_valid_dataset_name(dataset) {
            return Err(DestinationError::ConfigError(format!(
                "dataset name {:?} is not a lowercase SQL identifier",
                dataset
            )));
        }

        let provider = WarehouseProvider {
            dbc: DatabaseConnections::init().await?,
            dataset: dataset.to_string(),
        };
        provider.ensure_dataset().await?;

        Ok(provider)
    }

    async fn connection(
        &self,
    ) -> Result<Object<AsyncPgConnection>, DestinationError> {
        self.dbc
            .postgres
            .get()
            .await
            .map_err(|e| DestinationError::PoolError(e.to_string()))
    }

    // The dataset name is validated in `new`, so it is safe to splice in unquoted.
    fn search_path(&self) -> String {
        format!("SET LOCAL search_path TO {}, public", self.dataset)
    }

    async fn ensure_dataset(&self) -> Result<(), DestinationError> {
        let mut conn = self.connection().await?;
        let statements = [
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.dataset),
            format!(
                "CREATE TABLE IF NOT EXISTS {}.{} (
                    {} BIGINT PRIMARY KEY,
                    timestamp BIGINT NOT NULL,
                    gas_limit BIGINT NOT NULL,
                    gas_used BIGINT NOT NULL,
                    size BIGINT NOT NULL DEFAULT 0,
                    base_fee_per_gas BIGINT NOT NULL DEFAULT 0,
                    transactions_count BIGINT NOT NULL,
                    hash TEXT NOT NULL,
                    parent_hash TEXT NOT NULL
                )",
                self.dataset, BLOCKS_TABLE, MERGE_KEY
            ),
        ];
        for statement in statements {
            diesel::sql_query(statement).execute(&mut *conn).await?;
        }

        info!("dataset {} ready", self.dataset);
        Ok(())
    }

    fn check_table(table: &str) -> Result<(), DestinationError> {
        if table == BLOCKS_TABLE {
            Ok(())
        } else {
            Err(DestinationError::UnknownTable(table.to_string()))
        }
    }
}

#[async_trait]
impl Destination for WarehouseProvider {
    async fn merge(
        &self,
        table: &str,
        rows: Vec<BlockRecord>,
    ) -> Result<MergeReport, DestinationError> {
        Self::check_table(table)?;

        let (rows, warnings) = collapse_duplicate_keys(rows);
        let models = rows
            .iter()
            .map(BlockModel::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if models.is_empty() {
            return Ok(MergeReport {
                warnings,
                ..Default::default()
            });
        }

        let search_path = self.search_path();
        let mut conn = self.connection().await?;
        let conn: &mut AsyncPgConnection = &mut conn;

        // `xmax = 0` holds only for freshly inserted tuples.
        let inserted: Vec<bool> = conn
            .transaction::<_, DieselError, _>(|conn| {
                async move {
                    diesel::sql_query(search_path).execute(conn).await?;
                    diesel::insert_into(blocks_schema::blocks)
                        .values(&models)
                        .on_conflict(blocks_schema::number)
                        .do_update()
                        .set((
                            blocks_schema::timestamp.eq(excluded(blocks_schema::timestamp)),
                            blocks_schema::gas_limit.eq(excluded(blocks_schema::gas_limit)),
                            blocks_schema::gas_used.eq(excluded(blocks_schema::gas_used)),
                            blocks_schema::size.eq(excluded(blocks_schema::size)),
                            blocks_schema::base_fee_per_gas
                                .eq(excluded(blocks_schema::base_fee_per_gas)),
                            blocks_schema::transactions_count
                                .eq(excluded(blocks_schema::transactions_count)),
                            blocks_schema::hash.eq(excluded(blocks_schema::hash)),
                            blocks_schema::parent_hash.eq(excluded(blocks_schema::parent_hash)),
                        ))
                        .returning(sql::<Bool>("xmax = 0"))
                        .get_results(conn)
                        .await
                }
                .scope_boxed()
            })
            .await?;

        let inserted_count = inserted.iter().filter(|fresh| **fresh).count() as u64;
        let report = MergeReport {
            inserted: inserted_count,
            updated: inserted.len() as u64 - inserted_count,
            warnings,
        };
        debug!(
            "merged {} rows into {}.{} ({} new)",
            report.rows(),
            self.dataset,
            table,
            report.inserted
        );

        Ok(report)
    }

    async fn high_water_mark(&self, table: &str) -> Result<Option<u64>, DestinationError> {
        Self::check_table(table)?;

        let search_path = self.search_path();
        let mut conn = self.connection().await?;
        let conn: &mut AsyncPgConnection = &mut conn;

        let highest: Option<i64> = conn
            .transaction::<_, DieselError, _>(|conn| {
                async move {
                    diesel::sql_query(search_path).execute(conn).await?;
                    blocks_schema::blocks
                        .select(max(blocks_schema::number))
                        .first::<Option<i64>>(conn)
                        .await
                }
                .scope_boxed()
            })
            .await?;

        Ok(highest.map(|number| number as u64))
    }

    async fn record_run(&self, record: &LoadRecord) -> Result<(), DestinationError> {
        let model = NewLoadModel::try_from(record)?;
        let mut conn = self.connection().await?;

        diesel::insert_into(pipeline_loads_schema)
            .values(&model)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
