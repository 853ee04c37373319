use diesel::prelude::*;

use crate::error::DestinationError;
use crate::types::{BlockRecord, LoadRecord};

#[derive(Clone, Debug, Queryable, Selectable, Insertable, Identifiable, PartialEq)]
#[diesel(primary_key(number))]
#[diesel(table_name = crate::schema::blocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockModel {
    pub number: i64,
    pub timestamp: i64,
    pub gas_limit: i64,
    pub gas_used: i64,
    pub size: i64,
    pub base_fee_per_gas: i64,
    pub transactions_count: i64,
    pub hash: String,
    pub parent_hash: String,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = crate::schema::pipeline_loads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewLoadModel {
    pub dataset: String,
    pub first_block: Option<i64>,
    pub last_block: Option<i64>,
    pub batches: i64,
    pub rows: i64,
    pub status: String,
    pub error: Option<String>,
    pub started_at: chrono::NaiveDateTime,
    pub finished_at: chrono::NaiveDateTime,
}

pub(crate) fn to_bigint(field: &'static str, value: u64) -> Result<i64, DestinationError> {
    i64::try_from(value).map_err(|_| DestinationError::OutOfRange { field, value })
}

impl TryFrom<&BlockRecord> for BlockModel {
    type Error = DestinationError;

    fn try_from(value: &BlockRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            number: to_bigint("number", value.number)?,
            timestamp: to_bigint("timestamp", value.timestamp)?,
            gas_limit: to_bigint("gas_limit", value.gas_limit)?,
            gas_used: to_bigint("gas_used", value.gas_used)?,
            size: to_bigint("size", value.size)?,
            base_fee_per_gas: to_bigint("base_fee_per_gas", value.base_fee_per_gas)?,
            transactions_count: to_bigint("transactions_count", value.transactions_count)?,
            hash: value.hash.clone(),
            parent_hash: value.parent_hash.clone(),
        })
    }
}

impl From<BlockModel> for BlockRecord {
    fn from(value: BlockModel) -> Self {
        Self {
            number: value.number as u64,
            timestamp: value.timestamp as u64,
            gas_limit: value.gas_limit as u64,
            gas_used: value.gas_used as u64,
            size: value.size as u64,
            base_fee_per_gas: value.base_fee_per_gas as u64,
            transactions_count: value.transactions_count as u64,
            hash: value.hash,
            parent_hash: value.parent_hash,
        }
    }
}

impl TryFrom<&LoadRecord> for NewLoadModel {
    type Error = DestinationError;

    fn try_from(value: &LoadRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            dataset: value.dataset.clone(),
            first_block: value
                .first_block
                .map(|number| to_bigint("first_block", number))
                .transpose()?,
            last_block: value
                .last_block
                .map(|number| to_bigint("last_block", number))
                .transpose()?,
            batches: to_bigint("batches", value.batches)?,
            rows: to_bigint("rows", value.rows)?,
            status: value.status.to_string(),
            error: value.error.clone(),
            started_at: value.started_at,
            finished_at: value.finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunStatus;
    use pretty_assertions::assert_eq;

    fn record() -> BlockRecord {
        BlockRecord {
            number: 21_000_000,
            timestamp: 1_730_000_000,
            gas_limit: 30_000_000,
            gas_used: 12_345_678,
            size: 54_321,
            base_fee_per_gas: 7_000_000_000,
            transactions_count: 150,
            hash: "0xabc".to_string(),
            parent_hash: "0xdef".to_string(),
        }
    }

    #[test]
    fn block_model_conversion_keeps_values() {
        let model = BlockModel::try_from(&record()).unwrap();
        assert_eq!(model.number, 21_000_000);
        assert_eq!(model.base_fee_per_gas, 7_000_000_000);
        assert_eq!(BlockRecord::from(model), record());
    }

    #[test]
    fn block_model_rejects_values_beyond_bigint() {
        let mut record = record();
        record.base_fee_per_gas = u64::MAX;
        match BlockModel::try_from(&record) {
            Err(DestinationError::OutOfRange { field, value }) => {
                assert_eq!(field, "base_fee_per_gas");
                assert_eq!(value, u64::MAX);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn unplanned_run_has_no_block_span() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 11, 1)
            .and_then(|day| day.and_hms_opt(12, 0, 0))
            .unwrap();
        let model = NewLoadModel::try_from(&LoadRecord {
            dataset: "ethereum".to_string(),
            first_block: None,
            last_block: None,
            batches: 0,
            rows: 0,
            status: RunStatus::Failed,
            error: Some("connection refused".to_string()),
            started_at: at,
            finished_at: at,
        })
        .unwrap();

        assert_eq!((model.first_block, model.last_block), (None, None));
        assert_eq!(model.status, "failed");
        assert_eq!(model.error.as_deref(), Some("connection refused"));
    }
}
