use alloy::primitives::BlockNumber;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{ErrorPayload, PipelineError, TransportError};

pub const ETH_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const ETH_GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";

const JSONRPC_VERSION: &str = "2.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: 1,
            method: method.to_string(),
            params,
        }
    }
}

/// `result` is `None` only when the member is absent; `"result": null` is `Some(Value::Null)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Carries one JSON-RPC request to the node and brings back its envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        Ok(serde_json::from_slice(&body)?)
    }
}

pub struct RpcClient<T> {
    transport: T,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issues `method` and returns the `result` member untouched (`null` included).
    ///
    /// Any `error` member is an [`PipelineError::RpcError`]; an envelope with
    /// neither `error` nor `result` is a transport failure.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, PipelineError> {
        if method.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "method name must not be empty".to_string(),
            ));
        }

        let request = JsonRpcRequest::new(method, params);
        let response =
            self.transport
                .send(&request)
                .await
                .map_err(|source| PipelineError::TransportError {
                    method: method.to_string(),
                    block: None,
                    source,
                })?;

        if let Some(raw) = response.error {
            return Err(PipelineError::RpcError {
                method: method.to_string(),
                block: None,
                payload: ErrorPayload::from(raw),
            });
        }

        response.result.ok_or_else(|| PipelineError::TransportError {
            method: method.to_string(),
            block: None,
            source: TransportError::MalformedEnvelope(
                "response has neither `result` nor `error`".to_string(),
            ),
        })
    }

    pub async fn block_number(&self) -> Result<BlockNumber, PipelineError> {
        decode_quantity(&self.call(ETH_BLOCK_NUMBER, Vec::new()).await?)
    }

    /// Raw block at `number` with transaction hashes only, or `null` if the node has none.
    pub async fn block_by_number(&self, number: BlockNumber) -> Result<Value, PipelineError> {
        let tag = Value::String(format!("0x{:x}", number));

        self.call(ETH_GET_BLOCK_BY_NUMBER, vec![tag, Value::Bool(false)])
            .await
            .map_err(|e| e.at(number))
    }
}

/// Decodes a JSON-RPC quantity: a hex string (with or without `0x`) or a plain number.
pub fn decode_quantity(value: &Value) -> Result<u64, PipelineError> {
    let malformed = || PipelineError::MalformedValueError {
        value: value.to_string(),
        block: None,
    };

    match value {
        Value::String(s) => {
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(s);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(malformed());
            }
            u64::from_str_radix(digits, 16).map_err(|_| malformed())
        }
        Value::Number(n) => n.as_u64().ok_or_else(malformed),
        _ => Err(malformed()),
    }
}
