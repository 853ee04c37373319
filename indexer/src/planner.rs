use alloy::primitives::BlockNumber;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::ops::RangeInclusive;
use tracing::info;

use crate::error::PipelineError;
use crate::rpc::{RpcClient, Transport};

/// Closed interval of block numbers, `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: BlockNumber,
    pub end: BlockNumber,
}

impl BlockRange {
    pub fn new(start: BlockNumber, end: BlockNumber) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn block_count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn numbers(&self) -> RangeInclusive<BlockNumber> {
        self.start..=self.end
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Always the last `window_size` blocks up to the head.
    #[default]
    Trailing,
    /// The trailing window, extended back to just after the highest stored block.
    Resume,
}

/// `[max(0, latest - window_size + 1), latest]`.
pub fn trailing_window(latest: BlockNumber, window_size: NonZeroU64) -> BlockRange {
    let start = latest.saturating_sub(window_size.get() - 1);
    BlockRange::new(start, latest)
}

/// Widens the trailing window so that nothing after `high_water_mark` is missed.
pub fn resume_window(
    latest: BlockNumber,
    window_size: NonZeroU64,
    high_water_mark: Option<BlockNumber>,
) -> BlockRange {
    let trailing = trailing_window(latest, window_size);
    match high_water_mark {
        Some(stored) if stored < trailing.start => BlockRange::new(stored + 1, latest),
        _ => trailing,
    }
}

/// Reads the chain head and plans this run's range.
pub async fn plan<T: Transport>(
    client: &RpcClient<T>,
    window_size: NonZeroU64,
    policy: WindowPolicy,
    high_water_mark: Option<BlockNumber>,
) -> Result<BlockRange, PipelineError> {
    let latest = client.block_number().await?;
    let range = match policy {
        WindowPolicy::Trailing => trailing_window(latest, window_size),
        WindowPolicy::Resume => resume_window(latest, window_size, high_water_mark),
    };

    info!(
        "chain head {} window {} planned range {} ({} blocks)",
        latest,
        window_size,
        range,
        range.block_count()
    );

    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::rpc::{JsonRpcRequest, JsonRpcResponse};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn window(size: u64) -> NonZeroU64 {
        NonZeroU64::new(size).unwrap()
    }

    struct Head(&'static str);

    #[async_trait]
    impl Transport for Head {
        async fn send(&self, _: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Ok(JsonRpcResponse {
                result: Some(json!(self.0)),
                error: None,
            })
        }
    }

    #[test]
    fn short_chain_clamps_to_genesis() {
        assert_eq!(trailing_window(10, window(150)), BlockRange::new(0, 10));
        assert_eq!(trailing_window(0, window(150)), BlockRange::new(0, 0));
        assert_eq!(trailing_window(149, window(150)), BlockRange::new(0, 149));
    }

    #[test]
    fn long_chain_keeps_full_window() {
        let range = trailing_window(1000, window(150));
        assert_eq!(range, BlockRange::new(851, 1000));
        assert_eq!(range.block_count(), 150);
        assert_eq!(trailing_window(150, window(150)), BlockRange::new(1, 150));
        assert_eq!(trailing_window(7, window(1)), BlockRange::new(7, 7));
    }

    #[test]
    fn resume_covers_gap_since_last_load() {
        assert_eq!(
            resume_window(1000, window(150), Some(700)),
            BlockRange::new(701, 1000)
        );
    }

    #[test]
    fn resume_falls_back_to_trailing_window() {
        let trailing = BlockRange::new(851, 1000);
        assert_eq!(resume_window(1000, window(150), None), trailing);
        assert_eq!(resume_window(1000, window(150), Some(900)), trailing);
        assert_eq!(resume_window(1000, window(150), Some(850)), trailing);
        assert_eq!(resume_window(1000, window(150), Some(5000)), trailing);
    }

    #[tokio::test]
    async fn plan_reads_head_from_node() {
        let client = RpcClient::new(Head("0x3e8"));
        let range = plan(&client, window(150), WindowPolicy::Trailing, Some(10))
            .await
            .unwrap();
        assert_eq!(range, BlockRange::new(851, 1000));

        let range = plan(&client, window(150), WindowPolicy::Resume, Some(10))
            .await
            .unwrap();
        assert_eq!(range, BlockRange::new(11, 1000));
    }

    #[tokio::test]
    async fn malformed_head_is_reported() {
        let client = RpcClient::new(Head("latest"));
        assert!(matches!(
            plan(&client, window(5), WindowPolicy::Trailing, None).await,
            Err(PipelineError::MalformedValueError { .. })
        ));
    }
}
