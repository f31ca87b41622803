//! Faucet service for distributing test tokens.
//!
//! A request moves through the following steps:
//!
//! 1. Validate the requested tokens and chains against the configuration.
//! 2. Gate the recipient with the eligibility policy.
//! 3. Reserve every requested claim in the ledger. Claims already in the ledger are reported as
//!    already claimed and not dispatched.
//! 4. Dispatch the reserved claims, concurrently across chains and transfers.
//! 5. Release the claims whose transfer failed, and persist the ledger of every touched chain.
//!
//! Steps 4 and 5 run in a spawned task, so they complete even if the caller goes away.

use crate::{
    config::FaucetConfig,
    constants::{ALREADY_CLAIMED_REASON, RETRY_SHORTLY_REASON},
    eligibility::{Eligibility, EligibilityCheck},
    error::{DispatchError, FaucetError, ValidationError},
    ledger::ClaimLedger,
    metrics::FaucetMetrics,
    transactions::{DispatchRequest, Dispatcher},
    types::{
        ClaimKey, ClaimOutcome, Network, PlannedTransfer, TokenKind,
        rpc::{GetClaimedParameters, RequestTokensParameters, RequestTokensResponse},
    },
};
use alloy::primitives::{Address, map::HashMap};
use futures_util::future::join_all;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{Instrument, error, info, instrument, warn};

/// Faucet service for distributing test tokens.
#[derive(Debug, Clone)]
pub struct FaucetService {
    inner: Arc<FaucetServiceInner>,
}

#[derive(Debug)]
struct FaucetServiceInner {
    /// Distribution chains and defaults.
    config: FaucetConfig,
    /// Dispatcher per distribution chain.
    dispatchers: HashMap<Network, Arc<dyn Dispatcher>>,
    /// Eligibility policy.
    eligibility: Arc<dyn EligibilityCheck>,
    /// Claim ledger.
    ledger: ClaimLedger,
    /// Metrics of the service.
    metrics: FaucetMetrics,
}

impl FaucetService {
    /// Create a new faucet service.
    pub fn new(
        config: FaucetConfig,
        dispatchers: HashMap<Network, Arc<dyn Dispatcher>>,
        eligibility: Arc<dyn EligibilityCheck>,
        ledger: ClaimLedger,
    ) -> Self {
        Self {
            inner: Arc::new(FaucetServiceInner {
                config,
                dispatchers,
                eligibility,
                ledger,
                metrics: FaucetMetrics::default(),
            }),
        }
    }

    /// Returns the claim ledger.
    pub fn ledger(&self) -> &ClaimLedger {
        &self.inner.ledger
    }

    /// Distributes the requested tokens to the recipient.
    ///
    /// Fails as a whole only if the request is invalid or the recipient is not eligible, in which
    /// case nothing was reserved or sent. Otherwise every requested claim has an entry in the
    /// response.
    #[instrument(skip_all, fields(recipient = %params.recipient, tokens = ?params.tokens, chains = ?params.chains))]
    pub async fn request_tokens(
        &self,
        params: RequestTokensParameters,
    ) -> Result<RequestTokensResponse, FaucetError> {
        self.inner.metrics.requests.increment(1);
        let RequestTokensParameters { tokens, chains, recipient } = params;

        let tokens = tokens.into_iter().unique().collect::<Vec<_>>();
        if tokens.is_empty() {
            return Err(ValidationError::NoTokens.into());
        }
        let (chains, single_chain) = self.inner.config.resolve_chains(chains.as_deref())?;
        for chain in &chains {
            self.plan(*chain, &tokens)?;
        }

        if let Eligibility::Ineligible { reason } = self.inner.eligibility.check(recipient).await? {
            self.inner.metrics.ineligible.increment(1);
            info!(%reason, "Recipient is not eligible");
            return Err(FaucetError::Ineligible(reason));
        }

        let claims = chains
            .iter()
            .flat_map(|chain| tokens.iter().map(|token| ClaimKey::new(*chain, *token)))
            .collect::<Vec<_>>();
        let reservation = self.inner.ledger.reserve(recipient, &claims).await;

        let mut response = RequestTokensResponse::default();
        for claim in &reservation.already_claimed {
            self.inner.metrics.already_claimed.increment(1);
            response.insert(claim, single_chain, ClaimOutcome::error(ALREADY_CLAIMED_REASON));
        }

        if !reservation.reserved.is_empty() {
            let this = self.clone();
            let outcomes = tokio::spawn(
                async move { this.distribute(recipient, reservation.reserved).await }
                    .in_current_span(),
            )
            .await
            .map_err(|err| eyre::eyre!("distribution task failed: {err}"))?;

            for (claim, outcome) in outcomes {
                response.insert(&claim, single_chain, outcome);
            }
        }

        Ok(response)
    }

    /// Returns the tokens `recipient` already claimed on `chain`.
    pub async fn get_claimed(
        &self,
        params: GetClaimedParameters,
    ) -> Result<Vec<TokenKind>, FaucetError> {
        let GetClaimedParameters { chain, recipient } = params;
        if !self.inner.config.chains.contains_key(&chain) {
            return Err(ValidationError::UnsupportedChain(chain).into());
        }

        Ok(self.inner.ledger.get_claimed(chain, recipient).await.into_iter().collect())
    }

    /// Plans the transfers of `tokens` on `chain`.
    fn plan(
        &self,
        chain: Network,
        tokens: &[TokenKind],
    ) -> Result<Vec<PlannedTransfer>, ValidationError> {
        if !self.inner.dispatchers.contains_key(&chain) {
            return Err(ValidationError::UnsupportedChain(chain));
        }
        self.inner
            .config
            .chains
            .get(&chain)
            .ok_or(ValidationError::UnsupportedChain(chain))?
            .plan_transfers(chain, tokens)
    }

    /// Dispatches reserved `claims`, then reconciles and persists the ledger.
    async fn distribute(
        &self,
        recipient: Address,
        claims: Vec<ClaimKey>,
    ) -> Vec<(ClaimKey, ClaimOutcome)> {
        let by_chain = claims.iter().into_group_map_by(|claim| claim.chain);

        let outcomes = join_all(by_chain.iter().map(|(chain, claims)| {
            let tokens = claims.iter().map(|claim| claim.token).collect::<Vec<_>>();
            self.dispatch_chain(*chain, recipient, tokens)
        }))
        .await
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        let failed = outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(claim, _)| *claim)
            .collect::<Vec<_>>();
        self.inner.metrics.failed.increment(failed.len() as u64);
        self.inner.metrics.claimed.increment((outcomes.len() - failed.len()) as u64);
        if !failed.is_empty() {
            self.inner.ledger.release(recipient, &failed).await;
        }

        for chain in by_chain.keys() {
            if let Err(err) = self.inner.ledger.persist(*chain).await {
                self.inner.metrics.ledger_persist_failures.increment(1);
                error!(%chain, %err, "Failed to persist claim ledger");
            }
        }

        outcomes
    }

    /// Dispatches the transfers of `tokens` on `chain`.
    ///
    /// Every token gets an outcome, failures never affect other transfers.
    async fn dispatch_chain(
        &self,
        chain: Network,
        recipient: Address,
        tokens: Vec<TokenKind>,
    ) -> Vec<(ClaimKey, ClaimOutcome)> {
        let fail_all = |err: &DispatchError| {
            tokens
                .iter()
                .map(|token| {
                    let claim = ClaimKey::new(chain, *token);
                    (claim, failure_outcome(&claim, err))
                })
                .collect::<Vec<_>>()
        };

        let Some(dispatcher) = self.inner.dispatchers.get(&chain) else {
            return fail_all(&DispatchError::UnsupportedChain(chain));
        };
        let transfers = match self.plan(chain, &tokens) {
            Ok(transfers) => transfers,
            Err(err) => {
                error!(%chain, %err, "Failed to plan reserved transfers");
                return fail_all(&DispatchError::UnsupportedChain(chain));
            }
        };
        let plan = match dispatcher.plan(transfers.len()).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!(%chain, %err, "Failed to plan dispatch");
                return fail_all(&err);
            }
        };

        join_all(transfers.into_iter().enumerate().map(|(index, planned)| async move {
            let PlannedTransfer { tokens, transfer } = planned;
            let request = DispatchRequest {
                recipient,
                tokens: tokens.clone(),
                transfer,
                nonce: plan.nonce(index),
                fees: plan.fees,
            };
            let result = dispatcher.submit(request).await;

            tokens
                .into_iter()
                .map(|token| {
                    let claim = ClaimKey::new(chain, token);
                    let outcome = match &result {
                        Ok(tx_hash) => ClaimOutcome::Success { tx_hash: *tx_hash },
                        Err(err) => failure_outcome(&claim, err),
                    };
                    (claim, outcome)
                })
                .collect::<Vec<_>>()
        }))
        .await
        .into_iter()
        .flatten()
        .collect()
    }
}

/// User-facing outcome of a failed transfer.
fn failure_outcome(claim: &ClaimKey, err: &DispatchError) -> ClaimOutcome {
    if err.is_retryable() {
        ClaimOutcome::error(RETRY_SHORTLY_REASON)
    } else {
        ClaimOutcome::error(format!(
            "could not transfer token ({}) to recipient on chain ({})",
            claim.token, claim.chain
        ))
    }
}
