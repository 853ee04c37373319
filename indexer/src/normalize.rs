use db::BlockRecord;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::rpc::decode_quantity;

/// Maps a raw `eth_getBlockByNumber` result onto a [`BlockRecord`].
///
/// Returns `Ok(None)` for a `null` or empty block, which callers skip rather
/// than store.
pub fn normalize(raw: &Value) -> Result<Option<BlockRecord>, PipelineError> {
    let block = match raw {
        Value::Object(block) if !block.is_empty() => block,
        _ => return Ok(None),
    };

    Ok(Some(BlockRecord {
        number: required_quantity(block, "number")?,
        timestamp: required_quantity(block, "timestamp")?,
        gas_limit: required_quantity(block, "gasLimit")?,
        gas_used: required_quantity(block, "gasUsed")?,
        size: optional_quantity(block, "size")?,
        base_fee_per_gas: optional_quantity(block, "baseFeePerGas")?,
        transactions_count: transactions_count(block)?,
        hash: required_string(block, "hash")?,
        parent_hash: required_string(block, "parentHash")?,
    }))
}

fn required<'a>(block: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, PipelineError> {
    match block.get(field) {
        Some(Value::Null) | None => Err(PipelineError::SchemaError { field, block: None }),
        Some(value) => Ok(value),
    }
}

fn required_quantity(block: &Map<String, Value>, field: &'static str) -> Result<u64, PipelineError> {
    decode_quantity(required(block, field)?)
}

fn optional_quantity(block: &Map<String, Value>, field: &'static str) -> Result<u64, PipelineError> {
    match block.get(field) {
        Some(Value::Null) | None => Ok(0),
        Some(value) => decode_quantity(value),
    }
}

fn required_string(block: &Map<String, Value>, field: &'static str) -> Result<String, PipelineError> {
    match required(block, field)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(PipelineError::SchemaError { field, block: None }),
    }
}

fn transactions_count(block: &Map<String, Value>) -> Result<u64, PipelineError> {
    match block.get("transactions") {
        Some(Value::Null) | None => Ok(0),
        Some(Value::Array(transactions)) => Ok(transactions.len() as u64),
        Some(_) => Err(PipelineError::SchemaError {
            field: "transactions",
            block: None,
        }),
    }
}
