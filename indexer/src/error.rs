use db::DestinationError;
use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};
use serde_json::{Error as SerdeError, Value};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::load::LoadSummary;

/// Failure to reach the node or to read its answer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Reqwest Error: {0}")]
    ReqwestError(#[from] ReqwestError),

    #[error("Deserialization Error: {0}")]
    DeserializationError(#[from] SerdeError),

    #[error("Node Unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed Envelope: {0}")]
    MalformedEnvelope(String),
}

/// The `error` member of a JSON-RPC response.
///
/// An `error` that is not a `{code, message, data}` object is kept whole in `data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<Value> for ErrorPayload {
    fn from(raw: Value) -> Self {
        if raw.is_object() {
            if let Ok(payload) = serde_json::from_value(raw.clone()) {
                return payload;
            }
        }

        let message = match &raw {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        ErrorPayload {
            code: None,
            message,
            data: Some(raw),
        }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = self.code {
            write!(f, " (code {})", code)?;
        }
        if let Some(data) = &self.data {
            write!(f, ": {}", data)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Transport Error calling {method}{}: {source}", at_block(.block))]
    TransportError {
        method: String,
        block: Option<u64>,
        #[source]
        source: TransportError,
    },

    #[error("RPC Error calling {method}{}: {payload}", at_block(.block))]
    RpcError {
        method: String,
        block: Option<u64>,
        payload: ErrorPayload,
    },

    #[error("Malformed Value{}: {value} is not a hex quantity", at_block(.block))]
    MalformedValueError { value: String, block: Option<u64> },

    #[error("Schema Error{}: required field `{field}` is missing or mistyped", at_block(.block))]
    SchemaError {
        field: &'static str,
        block: Option<u64>,
    },

    #[error("Load Error on batch {batch}: {source}")]
    LoadError {
        batch: usize,
        #[source]
        source: DestinationError,
    },

    #[error("Destination Error: {0}")]
    DestinationError(#[source] DestinationError),

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    /// Attaches the block number being processed, unless one is already known.
    pub fn at(self, number: u64) -> Self {
        match self {
            PipelineError::TransportError {
                method,
                block: None,
                source,
            } => PipelineError::TransportError {
                method,
                block: Some(number),
                source,
            },
            PipelineError::RpcError {
                method,
                block: None,
                payload,
            } => PipelineError::RpcError {
                method,
                block: Some(number),
                payload,
            },
            PipelineError::MalformedValueError { value, block: None } => {
                PipelineError::MalformedValueError {
                    value,
                    block: Some(number),
                }
            }
            PipelineError::SchemaError { field, block: None } => PipelineError::SchemaError {
                field,
                block: Some(number),
            },
            other => other,
        }
    }

    pub fn block(&self) -> Option<u64> {
        match self {
            PipelineError::TransportError { block, .. }
            | PipelineError::RpcError { block, .. }
            | PipelineError::MalformedValueError { block, .. }
            | PipelineError::SchemaError { block, .. } => *block,
            PipelineError::LoadError { .. }
            | PipelineError::DestinationError(_)
            | PipelineError::InvalidRequest(_) => None,
        }
    }
}

fn at_block(block: &Option<u64>) -> String {
    match block {
        Some(number) => format!(" at block {}", number),
        None => String::new(),
    }
}

fn progress(committed: &LoadSummary) -> String {
    format!(
        "{} committed batches ({} rows)",
        committed.batches, committed.rows
    )
}

/// A run that stopped early, together with what it had already committed.
#[derive(Debug, Error)]
#[error("run failed after {}: {error}", progress(.committed))]
pub struct RunError {
    pub committed: LoadSummary,
    #[source]
    pub error: PipelineError,
}

/// Failure while wiring the indexer together, before any block is read.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Config Error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Transport Error: {0}")]
    TransportError(#[from] TransportError),

    #[error("Destination Error: {0}")]
    DestinationError(#[from] DestinationError),
}
