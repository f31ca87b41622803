//! Alloy provider extensions.

use alloy::{
    eips::BlockId,
    providers::Provider,
    transports::{RpcError, TransportResult},
};
use tracing::trace;

/// A block found by [`ProviderExt::block_at_timestamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAtTimestamp {
    /// The block number.
    pub number: u64,
    /// Whether a later block exists past the timestamp, so the result can no longer change.
    pub is_final: bool,
}

/// Extension trait for [`Provider`] adding historical lookups.
pub trait ProviderExt: Provider {
    /// Returns the timestamp of block `number`.
    fn block_timestamp(&self, number: u64) -> impl Future<Output = TransportResult<u64>> + Send {
        async move {
            let block = self.get_block(BlockId::number(number)).await?.ok_or(RpcError::NullResp)?;
            Ok(block.header.timestamp)
        }
    }

    /// Finds the last block with a timestamp at or before `timestamp` by binary search over block
    /// headers.
    ///
    /// If the chain has not reached `timestamp` yet, this is the latest block. If the chain started
    /// after `timestamp`, this is the genesis block.
    fn block_at_timestamp(
        &self,
        timestamp: u64,
    ) -> impl Future<Output = TransportResult<BlockAtTimestamp>> + Send {
        async move {
            let latest = self.get_block(BlockId::latest()).await?.ok_or(RpcError::NullResp)?;
            if latest.header.timestamp <= timestamp {
                return Ok(BlockAtTimestamp { number: latest.header.number, is_final: false });
            }
            if self.block_timestamp(0).await? > timestamp {
                return Ok(BlockAtTimestamp { number: 0, is_final: true });
            }

            // `low` is at or before the timestamp, `high` is past it.
            let (mut low, mut high) = (0, latest.header.number);
            while high - low > 1 {
                let mid = low + (high - low) / 2;
                if self.block_timestamp(mid).await? <= timestamp {
                    low = mid;
                } else {
                    high = mid;
                }
            }

            trace!(timestamp, block = low, "Resolved block at timestamp");
            Ok(BlockAtTimestamp { number: low, is_final: true })
        }
    }
}

impl<T> ProviderExt for T where T: Provider {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        consensus::Header,
        providers::{DynProvider, ProviderBuilder, mock::Asserter},
        rpc::types::{Block, Header as RpcHeader},
    };

    /// Block `number` of a chain producing a block every 100 seconds from `genesis` on.
    fn block(number: u64, genesis: u64) -> Block {
        let header = Header { number, timestamp: genesis + number * 100, ..Default::default() };
        Block { header: RpcHeader::new(header), ..Default::default() }
    }

    /// Provider answering with `blocks` in order.
    fn provider(asserter: &Asserter, blocks: &[u64], genesis: u64) -> DynProvider {
        for number in blocks {
            asserter.push_success(&block(*number, genesis));
        }
        ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone())
            .erased()
    }

    #[tokio::test]
    async fn finds_last_block_before_timestamp() {
        let asserter = Asserter::new();
        let provider = provider(&asserter, &[10, 0, 5, 2, 3, 4], 0);

        let block = provider.block_at_timestamp(450).await.unwrap();
        assert_eq!(block, BlockAtTimestamp { number: 4, is_final: true });
        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn exact_timestamp_matches_block() {
        let asserter = Asserter::new();
        let provider = provider(&asserter, &[10, 0, 5, 7, 6], 0);

        let block = provider.block_at_timestamp(500).await.unwrap();
        assert_eq!(block, BlockAtTimestamp { number: 5, is_final: true });
        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn future_timestamp_is_latest_block() {
        let asserter = Asserter::new();
        let provider = provider(&asserter, &[10], 0);

        // latest block at exactly the timestamp may still be followed by one at the same time
        let block = provider.block_at_timestamp(1000).await.unwrap();
        assert_eq!(block, BlockAtTimestamp { number: 10, is_final: false });

        asserter.push_success(&self::block(10, 0));
        let block = provider.block_at_timestamp(5000).await.unwrap();
        assert_eq!(block, BlockAtTimestamp { number: 10, is_final: false });
    }

    #[tokio::test]
    async fn timestamp_before_genesis_is_genesis() {
        let asserter = Asserter::new();
        let provider = provider(&asserter, &[10, 0], 1_000);

        let block = provider.block_at_timestamp(500).await.unwrap();
        assert_eq!(block, BlockAtTimestamp { number: 0, is_final: true });
    }

    #[tokio::test]
    async fn missing_block_is_an_error() {
        let asserter = Asserter::new();
        let provider = provider(&asserter, &[10], 0);
        asserter.push_success(&serde_json::Value::Null);

        let err = provider.block_at_timestamp(450).await.unwrap_err();
        assert!(matches!(err, RpcError::NullResp));
    }
}
