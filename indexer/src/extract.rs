use alloy::primitives::BlockNumber;
use db::BlockRecord;
use futures::stream::{self, Stream, StreamExt};
use std::num::NonZeroUsize;
use tracing::debug;

use crate::error::PipelineError;
use crate::normalize::normalize;
use crate::planner::BlockRange;
use crate::rpc::{RpcClient, Transport};

/// Fetches one block and normalizes it. `Ok(None)` means the node had no block there.
pub async fn fetch_block<T: Transport>(
    client: &RpcClient<T>,
    number: BlockNumber,
) -> Result<Option<BlockRecord>, PipelineError> {
    let raw = client.block_by_number(number).await?;
    let record = normalize(&raw).map_err(|e| e.at(number))?;
    if record.is_none() {
        debug!("block {} is empty, skipping", number);
    }

    Ok(record)
}

/// Lazily walks `range` in ascending order and yields batches of at most
/// `batch_size` records.
///
/// At most `max_concurrent_requests` blocks are fetched at once; results are
/// consumed in block order regardless. The first error is yielded and ends
/// the stream.
pub fn extract<'a, T: Transport>(
    client: &'a RpcClient<T>,
    range: BlockRange,
    batch_size: NonZeroUsize,
    max_concurrent_requests: NonZeroUsize,
) -> impl Stream<Item = Result<Vec<BlockRecord>, PipelineError>> + 'a {
    let batch_size = batch_size.get();
    let records = stream::iter(range.numbers())
        .map(move |number| fetch_block(client, number))
        .buffered(max_concurrent_requests.get());

    stream::try_unfold(Box::pin(records), move |mut records| async move {
        let mut batch = Vec::new();
        while let Some(record) = records.next().await {
            if let Some(record) = record? {
                batch.push(record);
                if batch.len() == batch_size {
                    return Ok(Some((batch, records)));
                }
            }
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some((batch, records)))
        }
    })
}
