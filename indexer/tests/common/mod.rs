#![allow(dead_code)]

use async_trait::async_trait;
use db::{BlockRecord, Destination, DestinationError, LoadRecord, MemoryProvider, MergeReport};
use indexer::error::TransportError;
use indexer::rpc::{
    decode_quantity, JsonRpcRequest, JsonRpcResponse, Transport, ETH_BLOCK_NUMBER,
    ETH_GET_BLOCK_BY_NUMBER,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn raw_block(number: u64, gas_used: u64) -> Value {
    json!({
        "number": format!("0x{:x}", number),
        "timestamp": format!("0x{:x}", 1_700_000_000 + number * 12),
        "gasLimit": "0x1c9c380",
        "gasUsed": format!("0x{:x}", gas_used),
        "size": "0x400",
        "baseFeePerGas": "0x3b9aca00",
        "hash": format!("0x{:064x}", number),
        "parentHash": format!("0x{:064x}", number.saturating_sub(1)),
        "transactions": [
            format!("0x{:064x}", number * 1000 + 1),
            format!("0x{:064x}", number * 1000 + 2)
        ]
    })
}

pub fn expected_record(number: u64, gas_used: u64) -> BlockRecord {
    BlockRecord {
        number,
        timestamp: 1_700_000_000 + number * 12,
        gas_limit: 30_000_000,
        gas_used,
        size: 1024,
        base_fee_per_gas: 1_000_000_000,
        transactions_count: 2,
        hash: format!("0x{:064x}", number),
        parent_hash: format!("0x{:064x}", number.saturating_sub(1)),
    }
}

pub fn numbers(batch: &[BlockRecord]) -> Vec<u64> {
    batch.iter().map(|record| record.number).collect()
}

enum Fault {
    Transport,
    Rpc,
    NoResult,
}

/// Scripted chain node. Every block up to `head` exists unless overridden.
pub struct StubNode {
    head: u64,
    head_fault: Option<Fault>,
    overrides: BTreeMap<u64, Value>,
    faults: BTreeMap<u64, Fault>,
    requests: Mutex<Vec<JsonRpcRequest>>,
}

impl StubNode {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            head_fault: None,
            overrides: BTreeMap::new(),
            faults: BTreeMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_block(mut self, number: u64, raw: Value) -> Self {
        self.overrides.insert(number, raw);
        self
    }

    pub fn with_missing(self, number: u64) -> Self {
        self.with_block(number, Value::Null)
    }

    pub fn with_transport_failure(mut self, number: u64) -> Self {
        self.faults.insert(number, Fault::Transport);
        self
    }

    pub fn with_head_transport_failure(mut self) -> Self {
        self.head_fault = Some(Fault::Transport);
        self
    }

    pub fn with_head_rpc_failure(mut self) -> Self {
        self.head_fault = Some(Fault::Rpc);
        self
    }

    /// Answers `{"jsonrpc":"2.0","id":1}` for `number`: no `result`, no `error`.
    pub fn with_empty_envelope(mut self, number: u64) -> Self {
        self.faults.insert(number, Fault::NoResult);
        self
    }

    pub fn with_rpc_failure(mut self, number: u64) -> Self {
        self.faults.insert(number, Fault::Rpc);
        self
    }

    pub fn requests(&self) -> Vec<JsonRpcRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn block_requests(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .filter(|request| request.method == ETH_GET_BLOCK_BY_NUMBER)
            .map(|request| decode_quantity(&request.params[0]).unwrap())
            .collect()
    }

    fn result(result: Value) -> Result<JsonRpcResponse, TransportError> {
        Ok(JsonRpcResponse {
            result: Some(result),
            error: None,
        })
    }
}

#[async_trait]
impl Transport for StubNode {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        match request.method.as_str() {
            ETH_BLOCK_NUMBER => match self.head_fault {
                Some(Fault::Transport) => Err(TransportError::Unavailable(
                    "connection refused".to_string(),
                )),
                Some(Fault::Rpc) => Ok(JsonRpcResponse {
                    result: None,
                    error: Some(json!("rate limited")),
                }),
                Some(Fault::NoResult) => Ok(JsonRpcResponse::default()),
                None => Self::result(json!(format!("0x{:x}", self.head))),
            },
            ETH_GET_BLOCK_BY_NUMBER => {
                assert_eq!(request.params[1], json!(false), "full transactions requested");
                let number = decode_quantity(&request.params[0]).unwrap();
                match self.faults.get(&number) {
                    Some(Fault::Transport) => Err(TransportError::Unavailable(format!(
                        "connection reset fetching {}",
                        number
                    ))),
                    Some(Fault::Rpc) => Ok(JsonRpcResponse {
                        result: None,
                        error: Some(json!({ "code": -32000, "message": "header not found" })),
                    }),
                    Some(Fault::NoResult) => Ok(JsonRpcResponse::default()),
                    None if number > self.head => Self::result(Value::Null),
                    None => Self::result(
                        self.overrides
                            .get(&number)
                            .cloned()
                            .unwrap_or_else(|| raw_block(number, 21_000 * number)),
                    ),
                }
            }
            other => Ok(JsonRpcResponse {
                result: None,
                error: Some(json!({
                    "code": -32601,
                    "message": format!("the method {} does not exist", other),
                })),
            }),
        }
    }
}

/// Memory destination whose `fail_on`-th merge call (1-based) fails.
pub struct FlakyDestination {
    pub inner: Arc<MemoryProvider>,
    fail_on: usize,
    calls: AtomicUsize,
}

impl FlakyDestination {
    pub fn new(fail_on: usize) -> Self {
        Self {
            inner: Arc::new(MemoryProvider::new()),
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Destination for FlakyDestination {
    async fn merge(
        &self,
        table: &str,
        rows: Vec<BlockRecord>,
    ) -> Result<MergeReport, DestinationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(DestinationError::PoolError("connection reset".to_string()));
        }
        self.inner.merge(table, rows).await
    }

    async fn high_water_mark(&self, table: &str) -> Result<Option<u64>, DestinationError> {
        self.inner.high_water_mark(table).await
    }

    async fn record_run(&self, record: &LoadRecord) -> Result<(), DestinationError> {
        self.inner.record_run(record).await
    }
}
