//! Claim ledger storage in-memory. For testing only.

use super::api::{ChainLedger, LedgerStoreApi, Result};
use crate::types::Network;
use async_trait::async_trait;
use dashmap::DashMap;

/// [`LedgerStoreApi`] implementation in-memory. Used for testing
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: DashMap<Network, ChainLedger>,
}

#[async_trait]
impl LedgerStoreApi for InMemoryLedgerStore {
    async fn load(&self, chain: Network) -> Result<ChainLedger> {
        Ok(self.ledgers.get(&chain).map(|ledger| ledger.clone()).unwrap_or_default())
    }

    async fn save(&self, chain: Network, ledger: &ChainLedger) -> Result<()> {
        self.ledgers.insert(chain, ledger.clone());
        Ok(())
    }
}
