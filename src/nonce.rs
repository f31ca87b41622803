//! Nonce management module.
//!
//! Transfers from the funding wallet are submitted concurrently, so nonces are handed out locally
//! instead of being filled in by the provider on every transaction.

use crate::types::Network;
use alloy::{primitives::Address, providers::Provider, transports::TransportResult};
use dashmap::DashMap;
use futures_util::lock::Mutex;
use std::sync::Arc;
use tracing::debug;

/// [`NonceSequencer`] hands out consecutive nonces per network and sender.
///
/// The next nonce is the larger of the chain's pending transaction count and the next locally
/// known nonce, so transactions submitted from outside the faucet are picked up, and so are
/// transactions of the faucet not yet visible to the node.
#[derive(Clone, Debug, Default)]
pub struct NonceSequencer {
    #[allow(clippy::type_complexity)]
    nonces: Arc<DashMap<(Network, Address), Arc<Mutex<Option<u64>>>>>,
}

impl NonceSequencer {
    /// Returns the slot of `address` on `chain`.
    fn slot(&self, chain: Network, address: Address) -> Arc<Mutex<Option<u64>>> {
        // Locks dashmap internally for a short duration to clone the `Arc`.
        // We don't want to hold the dashmap lock through any await point.
        let rm = self.nonces.entry((chain, address)).or_default();
        Arc::clone(rm.value())
    }

    /// Allocates `count` consecutive nonces for `address` on `chain`, returning the first.
    pub async fn allocate<P: Provider>(
        &self,
        provider: &P,
        chain: Network,
        address: Address,
        count: u64,
    ) -> TransportResult<u64> {
        let pending = provider.get_transaction_count(address).pending().await?;
        Ok(self.advance(chain, address, pending, count).await)
    }

    /// Allocates `count` consecutive nonces given the chain's pending transaction count.
    pub async fn advance(&self, chain: Network, address: Address, pending: u64, count: u64) -> u64 {
        let slot = self.slot(chain, address);
        let mut next = slot.lock().await;

        let first = next.map_or(pending, |next| next.max(pending));
        *next = Some(first + count);

        debug!(%chain, %address, first, count, "Allocated nonces");
        first
    }

    /// Forgets the locally known nonce of `address` on `chain`.
    ///
    /// The next allocation starts from the chain's pending transaction count again, so nonces of
    /// transactions that never made it to the node are reused.
    pub async fn resync(&self, chain: Network, address: Address) {
        *self.slot(chain, address).lock().await = None;
    }
}
