//! Claim ledger storage api.

use crate::{
    error::LedgerError,
    types::{Network, TokenKind},
};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
};

/// Type alias for `Result<T, LedgerError>`
pub type Result<T> = core::result::Result<T, LedgerError>;

/// Claims recorded on a single chain, by recipient.
pub type ChainLedger = BTreeMap<Address, BTreeSet<TokenKind>>;

/// Durable storage of the claim ledger, one document per chain.
#[async_trait]
pub trait LedgerStoreApi: Debug + Send + Sync {
    /// Loads the ledger of `chain`.
    ///
    /// A chain that was never saved yields an empty ledger.
    async fn load(&self, chain: Network) -> Result<ChainLedger>;

    /// Overwrites the ledger of `chain`.
    async fn save(&self, chain: Network, ledger: &ChainLedger) -> Result<()>;
}
