//! Claim ledger.
//!
//! The ledger records which token kinds every recipient already received on every chain, and is
//! the only thing preventing a recipient from claiming the same token twice. Entries are added
//! before the corresponding transfer is submitted and removed again if the transfer fails.

mod api;
pub use api::{ChainLedger, LedgerStoreApi};
mod file;
pub use file::FileLedgerStore;
mod memory;
pub use memory::InMemoryLedgerStore;

use crate::{
    error::LedgerError,
    types::{ClaimKey, Network, TokenKind},
};
use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    collections::{BTreeSet, HashMap},
    path::PathBuf,
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Claim ledger storage interface.
#[derive(Debug, Clone)]
pub struct LedgerStorage {
    inner: Arc<dyn LedgerStoreApi>,
}

impl LedgerStorage {
    /// Create [`LedgerStorage`] backed by JSON files in `directory`.
    pub fn file(directory: impl Into<PathBuf>) -> Self {
        Self { inner: Arc::new(FileLedgerStore::new(directory)) }
    }

    /// Create [`LedgerStorage`] with a in-memory backend. Used for testing only.
    pub fn in_memory() -> Self {
        Self { inner: Arc::new(InMemoryLedgerStore::default()) }
    }

    /// Create [`LedgerStorage`] with a custom backend.
    pub fn new(inner: Arc<dyn LedgerStoreApi>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LedgerStoreApi for LedgerStorage {
    async fn load(&self, chain: Network) -> api::Result<ChainLedger> {
        self.inner.load(chain).await
    }

    async fn save(&self, chain: Network, ledger: &ChainLedger) -> api::Result<()> {
        self.inner.save(chain, ledger).await
    }
}

/// Result of [`ClaimLedger::reserve`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Claims that were free and are now reserved.
    pub reserved: Vec<ClaimKey>,
    /// Claims that were already recorded for the recipient.
    pub already_claimed: Vec<ClaimKey>,
}

/// In-memory view of the claim ledger, lazily loaded per chain from [`LedgerStorage`].
///
/// All reads and writes go through a single lock, which makes [`ClaimLedger::reserve`] an atomic
/// check-and-insert across all claims of a request. Storage writes happen outside of that lock.
#[derive(Debug, Clone)]
pub struct ClaimLedger {
    storage: LedgerStorage,
    ledgers: Arc<Mutex<HashMap<Network, ChainLedger>>>,
    /// Serialises storage writes per chain, so the latest snapshot is always written last.
    writes: Arc<DashMap<Network, Arc<Mutex<()>>>>,
}

impl ClaimLedger {
    /// Creates a new [`ClaimLedger`] on top of `storage`.
    pub fn new(storage: LedgerStorage) -> Self {
        Self { storage, ledgers: Default::default(), writes: Default::default() }
    }

    /// Returns the ledger of `chain`, loading it from storage on first access.
    ///
    /// A ledger that fails to load is logged and replaced by an empty one.
    async fn chain_ledger<'a>(
        &self,
        ledgers: &'a mut HashMap<Network, ChainLedger>,
        chain: Network,
    ) -> &'a mut ChainLedger {
        if !ledgers.contains_key(&chain) {
            let ledger = match self.storage.load(chain).await {
                Ok(ledger) => {
                    debug!(%chain, recipients = ledger.len(), "Loaded claim ledger");
                    ledger
                }
                Err(err) => {
                    error!(%chain, %err, "Failed to load claim ledger, starting empty");
                    ChainLedger::new()
                }
            };
            ledgers.insert(chain, ledger);
        }

        ledgers.entry(chain).or_default()
    }

    /// Returns the token kinds `recipient` already claimed on `chain`.
    pub async fn get_claimed(&self, chain: Network, recipient: Address) -> BTreeSet<TokenKind> {
        let mut ledgers = self.ledgers.lock().await;
        self.chain_ledger(&mut ledgers, chain).await.get(&recipient).cloned().unwrap_or_default()
    }

    /// Reserves `claims` for `recipient`.
    ///
    /// Claims already in the ledger are reported back as already claimed, all others are added to
    /// the ledger. The check and the insertion happen under the same lock, so two concurrent
    /// requests can never reserve the same claim.
    pub async fn reserve(&self, recipient: Address, claims: &[ClaimKey]) -> Reservation {
        let mut ledgers = self.ledgers.lock().await;
        let mut reservation = Reservation::default();

        for claim in claims {
            let ledger = self.chain_ledger(&mut ledgers, claim.chain).await;
            if ledger.entry(recipient).or_default().insert(claim.token) {
                reservation.reserved.push(*claim);
            } else {
                reservation.already_claimed.push(*claim);
            }
        }

        reservation
    }

    /// Removes reserved `claims` of `recipient`, making them claimable again.
    pub async fn release(&self, recipient: Address, claims: &[ClaimKey]) {
        let mut ledgers = self.ledgers.lock().await;

        for claim in claims {
            let ledger = self.chain_ledger(&mut ledgers, claim.chain).await;
            if let Some(tokens) = ledger.get_mut(&recipient) {
                tokens.remove(&claim.token);
                if tokens.is_empty() {
                    ledger.remove(&recipient);
                }
            }
        }
    }

    /// Writes the ledger of `chain` to storage.
    ///
    /// On failure the in-memory ledger stays authoritative until the next successful write.
    pub async fn persist(&self, chain: Network) -> Result<(), LedgerError> {
        let write = Arc::clone(self.writes.entry(chain).or_default().value());
        let _write = write.lock().await;

        let snapshot = {
            let mut ledgers = self.ledgers.lock().await;
            self.chain_ledger(&mut ledgers, chain).await.clone()
        };
        self.storage.save(chain, &snapshot).await
    }
}
