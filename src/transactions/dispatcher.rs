//! Dispatching transfers to a single chain.

use super::DispatcherMetrics;
use crate::{
    config::FeeConfig,
    error::DispatchError,
    nonce::NonceSequencer,
    signers::DynSigner,
    types::{Network, TokenKind, Transfer},
};
use alloy::{
    eips::{BlockId, Encodable2718, eip1559::Eip1559Estimation},
    network::{Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder},
    primitives::{Address, ChainId, TxHash},
    providers::{DynProvider, Provider},
    transports::{RpcError, TransportErrorKind, TransportResult},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Nonces and fees shared by all transfers of one request on one chain.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPlan {
    /// Nonce of the first transfer. The following transfers use consecutive nonces.
    pub first_nonce: u64,
    /// Fees of every transfer.
    pub fees: Eip1559Estimation,
}

impl DispatchPlan {
    /// Nonce of the transfer at `index`.
    pub const fn nonce(&self, index: usize) -> u64 {
        self.first_nonce + index as u64
    }
}

/// A single transfer ready to be submitted.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Recipient of the transfer.
    pub recipient: Address,
    /// Token kinds covered by the transfer.
    pub tokens: Vec<TokenKind>,
    /// The transfer.
    pub transfer: Transfer,
    /// Nonce of the transaction.
    pub nonce: u64,
    /// Fees of the transaction.
    pub fees: Eip1559Estimation,
}

/// Submits transfers from the funding wallet to a single chain.
#[async_trait]
pub trait Dispatcher: Debug + Send + Sync {
    /// Allocates `count` consecutive nonces and estimates fees for them.
    async fn plan(&self, count: usize) -> Result<DispatchPlan, DispatchError>;

    /// Signs and broadcasts a transfer, returning its hash once the node accepted it.
    ///
    /// Does not wait for the transaction to be mined.
    async fn submit(&self, request: DispatchRequest) -> Result<TxHash, DispatchError>;
}

/// [`Dispatcher`] backed by an RPC provider and the funding wallet.
#[derive(Debug, Clone)]
pub struct ChainDispatcher {
    /// The chain transfers are sent to.
    chain: Network,
    /// Provider of the chain.
    provider: DynProvider,
    /// Funding wallet.
    wallet: EthereumWallet,
    /// Cached chain id of the provider.
    chain_id: ChainId,
    /// Nonces of the funding wallet, shared across dispatchers.
    nonces: NonceSequencer,
    /// Fee settings of the chain.
    fees: FeeConfig,
    /// Upper bound on a single submission.
    timeout: Duration,
    /// Metrics of the dispatcher.
    metrics: Arc<DispatcherMetrics>,
}

impl ChainDispatcher {
    /// Creates a new [`ChainDispatcher`].
    pub async fn new(
        chain: Network,
        provider: DynProvider,
        signer: DynSigner,
        nonces: NonceSequencer,
        fees: FeeConfig,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let chain_id = provider.get_chain_id().await?;
        debug!(%chain, chain_id, sender = %signer.address(), "Connected dispatcher");

        Ok(Self {
            chain,
            provider,
            wallet: EthereumWallet::new(signer.0),
            chain_id,
            nonces,
            fees,
            timeout,
            metrics: Arc::new(DispatcherMetrics::new_with_labels(&[("chain", chain.to_string())])),
        })
    }

    /// Returns the funding wallet address.
    pub fn address(&self) -> Address {
        NetworkWallet::<Ethereum>::default_signer_address(&self.wallet)
    }

    /// Estimates fees from the latest block.
    async fn estimate_fees(&self) -> TransportResult<Eip1559Estimation> {
        let latest = self.provider.get_block(BlockId::latest()).await?.ok_or(RpcError::NullResp)?;
        Ok(self.fees.estimate_eip1559_fees(latest.header.base_fee_per_gas))
    }

    /// Builds, signs and broadcasts the transaction of `request`.
    async fn send(&self, request: &DispatchRequest) -> TransportResult<TxHash> {
        let mut tx = request
            .transfer
            .to_transaction_request(request.recipient)
            .with_from(self.address())
            .with_chain_id(self.chain_id)
            .with_nonce(request.nonce)
            .with_max_fee_per_gas(request.fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(request.fees.max_priority_fee_per_gas);

        let gas_limit = self.provider.estimate_gas(tx.clone()).await?;
        tx.set_gas_limit(gas_limit);

        let signed = <_ as TransactionBuilder<Ethereum>>::build(tx, &self.wallet)
            .await
            .map_err(TransportErrorKind::custom)?;
        let pending = self.provider.send_raw_transaction(&signed.encoded_2718()).await?;

        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl Dispatcher for ChainDispatcher {
    #[instrument(skip(self), fields(chain = %self.chain))]
    async fn plan(&self, count: usize) -> Result<DispatchPlan, DispatchError> {
        // Nonces are allocated last, so a failed plan never leaves a gap in the sequence.
        let plan = async {
            let fees = self.estimate_fees().await?;
            let first_nonce = self
                .nonces
                .allocate(&self.provider, self.chain, self.address(), count as u64)
                .await?;
            Ok::<_, DispatchError>(DispatchPlan { first_nonce, fees })
        };

        tokio::time::timeout(self.timeout, plan)
            .await
            .map_err(|_| DispatchError::Timeout(self.timeout))?
    }

    #[instrument(skip_all, fields(chain = %self.chain, recipient = %request.recipient, nonce = request.nonce))]
    async fn submit(&self, request: DispatchRequest) -> Result<TxHash, DispatchError> {
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.send(&request)).await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        };

        match &result {
            Ok(tx_hash) => {
                self.metrics.sent.increment(1);
                self.metrics.submission_time.record(start.elapsed().as_millis() as f64);
                debug!(%tx_hash, tokens = ?request.tokens, "Submitted transfer");
            }
            Err(err) => {
                self.metrics.failed.increment(1);
                match err {
                    DispatchError::NonceConflict(_) => self.metrics.nonce_conflicts.increment(1),
                    DispatchError::Timeout(_) => self.metrics.timeouts.increment(1),
                    _ => {}
                }
                warn!(%err, tokens = ?request.tokens, "Failed to submit transfer");

                // Any failed submission may leave a gap, so start over from the chain.
                self.nonces.resync(self.chain, self.address()).await;
            }
        }

        result
    }
}
