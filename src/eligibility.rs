//! Eligibility gating of recipients.
//!
//! A recipient is eligible if its native balance on one or more reference networks satisfies the
//! configured [`EligibilityConfig`]. Eligibility is checked before any ledger or chain mutation.

use crate::{
    config::{EligibilityConfig, SnapshotConfig},
    error::EligibilityError,
    provider::ProviderExt,
    types::Network,
};
use alloy::{
    eips::BlockId,
    primitives::{Address, U256, map::HashMap, utils::format_ether},
    providers::{DynProvider, Provider},
};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use itertools::Itertools;
use std::fmt::Debug;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

/// Result of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// The recipient may claim.
    Eligible,
    /// The recipient may not claim.
    Ineligible {
        /// User-facing reason.
        reason: String,
    },
}

impl Eligibility {
    /// Whether the recipient may claim.
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Decides whether a recipient may claim.
#[async_trait]
pub trait EligibilityCheck: Debug + Send + Sync {
    /// Checks `recipient` against the eligibility policy.
    ///
    /// Returns an error if the balances could not be determined.
    async fn check(&self, recipient: Address) -> Result<Eligibility, EligibilityError>;
}

/// Balances of a recipient, fetched for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilitySnapshot {
    /// No balances are needed.
    Open,
    /// Current balances on every reference network.
    AnyBalance {
        /// Balance per reference network.
        balances: Vec<(Network, U256)>,
    },
    /// Balance on a single reference network, now and optionally at a historical block.
    MinBalance {
        /// The reference network.
        network: Network,
        /// The required balance.
        minimum: U256,
        /// Balance at the latest block.
        current: U256,
        /// Balance at the snapshot block.
        historical: Option<U256>,
    },
}

impl EligibilitySnapshot {
    /// Evaluates the snapshot.
    pub fn evaluate(&self) -> Eligibility {
        match self {
            Self::Open => Eligibility::Eligible,
            Self::AnyBalance { balances } => {
                if balances.iter().any(|(_, balance)| !balance.is_zero()) {
                    Eligibility::Eligible
                } else {
                    let networks = balances.iter().map(|(network, _)| network).join(", ");
                    Eligibility::Ineligible {
                        reason: format!("recipient must have a balance on one of: {networks}"),
                    }
                }
            }
            Self::MinBalance { network, minimum, current, historical } => {
                if current >= minimum && historical.is_none_or(|balance| balance >= *minimum) {
                    return Eligibility::Eligible;
                }

                let mut reason = format!(
                    "recipient must have at least {} {} on {network}",
                    display_ether(*minimum),
                    network.native_symbol(),
                );
                if historical.is_some() {
                    reason.push_str(", both now and before");
                }
                Eligibility::Ineligible { reason }
            }
        }
    }
}

/// Formats `amount` in whole native units without trailing zeros.
fn display_ether(amount: U256) -> String {
    let formatted = format_ether(amount);
    match formatted.split_once('.') {
        Some((whole, fraction)) => match fraction.trim_end_matches('0') {
            "" => whole.to_string(),
            fraction => format!("{whole}.{fraction}"),
        },
        None => formatted,
    }
}

/// [`EligibilityCheck`] querying reference networks through RPC providers.
#[derive(Debug)]
pub struct EligibilityVerifier {
    /// The policy.
    policy: EligibilityConfig,
    /// Providers of the reference networks.
    providers: HashMap<Network, DynProvider>,
    /// Resolved snapshot block, once it can no longer change.
    snapshot_block: OnceCell<u64>,
}

impl EligibilityVerifier {
    /// Creates a new [`EligibilityVerifier`].
    ///
    /// Fails if a reference network of `policy` has no provider.
    pub fn new(
        policy: EligibilityConfig,
        providers: HashMap<Network, DynProvider>,
    ) -> Result<Self, EligibilityError> {
        let networks = match &policy {
            EligibilityConfig::Open => Vec::new(),
            EligibilityConfig::AnyBalance { networks } => networks.clone(),
            EligibilityConfig::MinBalance { network, .. } => vec![*network],
        };
        if let Some(network) = networks.into_iter().find(|network| !providers.contains_key(network))
        {
            return Err(EligibilityError::MissingProvider(network));
        }

        Ok(Self { policy, providers, snapshot_block: OnceCell::new() })
    }

    fn provider(&self, network: Network) -> Result<&DynProvider, EligibilityError> {
        self.providers.get(&network).ok_or(EligibilityError::MissingProvider(network))
    }

    /// Returns the native balance of `recipient` on `network` at `block`.
    async fn balance(
        &self,
        network: Network,
        recipient: Address,
        block: BlockId,
    ) -> Result<U256, EligibilityError> {
        self.provider(network)?
            .get_balance(recipient)
            .block_id(block)
            .await
            .map_err(|source| EligibilityError::Rpc { network, source })
    }

    /// Resolves the snapshot block on `network`.
    ///
    /// If the block can't be determined, this falls back to the latest block.
    async fn snapshot_block(&self, network: Network, snapshot: SnapshotConfig) -> BlockId {
        let timestamp = match snapshot {
            SnapshotConfig::Block(number) => return BlockId::number(number),
            SnapshotConfig::Timestamp(timestamp) => timestamp,
        };

        if let Some(number) = self.snapshot_block.get() {
            return BlockId::number(*number);
        }

        let provider = match self.provider(network) {
            Ok(provider) => provider,
            Err(err) => {
                warn!(%network, %err, "Could not resolve snapshot block, using latest block");
                return BlockId::latest();
            }
        };

        match provider.block_at_timestamp(timestamp).await {
            Ok(block) => {
                debug!(%network, timestamp, block = block.number, "Resolved snapshot block");
                if block.is_final {
                    let _ = self.snapshot_block.set(block.number);
                }
                BlockId::number(block.number)
            }
            Err(err) => {
                warn!(%network, timestamp, %err, "Could not resolve snapshot block, using latest block");
                BlockId::latest()
            }
        }
    }

    /// Fetches the balances `policy` needs for `recipient`.
    pub async fn snapshot(&self, recipient: Address) -> Result<EligibilitySnapshot, EligibilityError> {
        match &self.policy {
            EligibilityConfig::Open => Ok(EligibilitySnapshot::Open),
            EligibilityConfig::AnyBalance { networks } => {
                let balances = try_join_all(networks.iter().map(|network| async move {
                    let balance = self.balance(*network, recipient, BlockId::latest()).await?;
                    Ok::<_, EligibilityError>((*network, balance))
                }))
                .await?;
                Ok(EligibilitySnapshot::AnyBalance { balances })
            }
            EligibilityConfig::MinBalance { network, minimum, snapshot } => {
                let snapshot_block = match snapshot {
                    Some(snapshot) => Some(self.snapshot_block(*network, *snapshot).await),
                    None => None,
                };
                let historical = async {
                    match snapshot_block {
                        Some(block) => self.balance(*network, recipient, block).await.map(Some),
                        None => Ok(None),
                    }
                };
                let (current, historical) = tokio::try_join!(
                    self.balance(*network, recipient, BlockId::latest()),
                    historical
                )?;

                Ok(EligibilitySnapshot::MinBalance {
                    network: *network,
                    minimum: *minimum,
                    current,
                    historical,
                })
            }
        }
    }
}

#[async_trait]
impl EligibilityCheck for EligibilityVerifier {
    #[instrument(skip(self))]
    async fn check(&self, recipient: Address) -> Result<Eligibility, EligibilityError> {
        let snapshot = self.snapshot(recipient).await?;
        debug!(?snapshot, "Fetched eligibility snapshot");
        Ok(snapshot.evaluate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_MIN_ELIGIBLE_BALANCE;
    use alloy::{
        consensus::Header,
        primitives::{address, uint},
        providers::{ProviderBuilder, mock::Asserter},
        rpc::types::{Block, Header as RpcHeader},
    };

    const RECIPIENT: Address = address!("0x00000000000000000000000000000000000000aa");

    fn mocked(asserter: &Asserter) -> DynProvider {
        ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone())
            .erased()
    }

    /// Queues blocks of a chain producing a block every 100 seconds from genesis at 0.
    fn push_blocks(asserter: &Asserter, numbers: &[u64]) {
        for &number in numbers {
            let header = Header { number, timestamp: number * 100, ..Default::default() };
            let block: Block = Block { header: RpcHeader::new(header), ..Default::default() };
            asserter.push_success(&block);
        }
    }

    fn push_balances(asserter: &Asserter, balances: &[U256]) {
        for balance in balances {
            asserter.push_success(balance);
        }
    }

    fn min_balance_verifier(asserter: &Asserter, snapshot: SnapshotConfig) -> EligibilityVerifier {
        let policy = EligibilityConfig::MinBalance {
            network: Network::BnbMainnet,
            minimum: DEFAULT_MIN_ELIGIBLE_BALANCE,
            snapshot: Some(snapshot),
        };
        let providers = HashMap::from_iter([(Network::BnbMainnet, mocked(asserter))]);
        EligibilityVerifier::new(policy, providers).unwrap()
    }

    #[test]
    fn open_is_always_eligible() {
        assert!(EligibilitySnapshot::Open.evaluate().is_eligible());
    }

    #[test]
    fn any_balance_needs_one_nonzero_balance() {
        let snapshot = EligibilitySnapshot::AnyBalance {
            balances: vec![(Network::EthMainnet, U256::ZERO), (Network::ArbMainnet, U256::from(1))],
        };
        assert!(snapshot.evaluate().is_eligible());

        let snapshot = EligibilitySnapshot::AnyBalance {
            balances: vec![(Network::EthMainnet, U256::ZERO), (Network::ArbMainnet, U256::ZERO)],
        };
        assert_eq!(
            snapshot.evaluate(),
            Eligibility::Ineligible {
                reason: "recipient must have a balance on one of: eth-mainnet, arb-mainnet"
                    .to_string()
            }
        );
    }

    #[test]
    fn min_balance_checks_both_heights() {
        let snapshot = |current: U256, historical: Option<U256>| EligibilitySnapshot::MinBalance {
            network: Network::BnbMainnet,
            minimum: DEFAULT_MIN_ELIGIBLE_BALANCE,
            current,
            historical,
        };
        let enough = DEFAULT_MIN_ELIGIBLE_BALANCE;
        let short = DEFAULT_MIN_ELIGIBLE_BALANCE - U256::from(1);

        assert!(snapshot(enough, Some(enough)).evaluate().is_eligible());
        assert!(snapshot(enough, None).evaluate().is_eligible());

        let expected = Eligibility::Ineligible {
            reason: "recipient must have at least 0.002 BNB on bnb-mainnet, both now and before"
                .to_string(),
        };
        assert_eq!(snapshot(short, Some(enough)).evaluate(), expected);
        assert_eq!(snapshot(enough, Some(short)).evaluate(), expected);

        assert_eq!(
            snapshot(short, None).evaluate(),
            Eligibility::Ineligible {
                reason: "recipient must have at least 0.002 BNB on bnb-mainnet".to_string()
            }
        );
    }

    #[test]
    fn formats_whole_units() {
        assert_eq!(display_ether(uint!(2000000000000000_U256)), "0.002");
        assert_eq!(display_ether(uint!(1000000000000000000_U256)), "1");
        assert_eq!(display_ether(uint!(1500000000000000000_U256)), "1.5");
    }

    #[test]
    fn requires_reference_providers() {
        let err = EligibilityVerifier::new(EligibilityConfig::default(), HashMap::default())
            .unwrap_err();
        assert!(matches!(err, EligibilityError::MissingProvider(Network::BnbMainnet)));

        assert!(EligibilityVerifier::new(EligibilityConfig::Open, HashMap::default()).is_ok());
    }

    #[tokio::test]
    async fn caches_final_snapshot_block() {
        let asserter = Asserter::new();
        let verifier = min_balance_verifier(&asserter, SnapshotConfig::Timestamp(450));
        let enough = DEFAULT_MIN_ELIGIBLE_BALANCE;

        push_blocks(&asserter, &[10, 0, 5, 2, 3, 4]);
        push_balances(&asserter, &[enough, enough]);
        assert!(verifier.check(RECIPIENT).await.unwrap().is_eligible());
        assert_eq!(verifier.snapshot_block.get(), Some(&4));
        assert!(asserter.read_q().is_empty());

        // no block lookups once resolved
        push_balances(&asserter, &[enough, enough]);
        assert!(verifier.check(RECIPIENT).await.unwrap().is_eligible());
        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn pending_snapshot_block_is_resolved_again() {
        let asserter = Asserter::new();
        let verifier = min_balance_verifier(&asserter, SnapshotConfig::Timestamp(5_000));
        let enough = DEFAULT_MIN_ELIGIBLE_BALANCE;

        for _ in 0..2 {
            push_blocks(&asserter, &[10]);
            push_balances(&asserter, &[enough, enough]);
            assert!(verifier.check(RECIPIENT).await.unwrap().is_eligible());
            assert_eq!(verifier.snapshot_block.get(), None);
            assert!(asserter.read_q().is_empty());
        }
    }

    #[tokio::test]
    async fn snapshot_lookup_failure_uses_latest_block() {
        let asserter = Asserter::new();
        let verifier = min_balance_verifier(&asserter, SnapshotConfig::Timestamp(450));
        let enough = DEFAULT_MIN_ELIGIBLE_BALANCE;

        asserter.push_failure_msg("header not found");
        push_balances(&asserter, &[enough, enough]);
        assert!(verifier.check(RECIPIENT).await.unwrap().is_eligible());
        assert_eq!(verifier.snapshot_block.get(), None);
        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn short_balance_at_snapshot_block_is_ineligible() {
        let asserter = Asserter::new();
        let verifier = min_balance_verifier(&asserter, SnapshotConfig::Block(4));
        let short = DEFAULT_MIN_ELIGIBLE_BALANCE - U256::from(1);

        push_balances(&asserter, &[DEFAULT_MIN_ELIGIBLE_BALANCE, short]);
        assert_eq!(
            verifier.check(RECIPIENT).await.unwrap(),
            Eligibility::Ineligible {
                reason: "recipient must have at least 0.002 BNB on bnb-mainnet, both now and before"
                    .to_string()
            }
        );
    }

    #[tokio::test]
    async fn balance_failure_aborts_check() {
        let eth = Asserter::new();
        let arb = Asserter::new();
        let policy =
            EligibilityConfig::AnyBalance { networks: vec![Network::EthMainnet, Network::ArbMainnet] };
        let verifier = EligibilityVerifier::new(
            policy,
            HashMap::from_iter([
                (Network::EthMainnet, mocked(&eth)),
                (Network::ArbMainnet, mocked(&arb)),
            ]),
        )
        .unwrap();

        eth.push_success(&U256::from(1));
        arb.push_failure_msg("upstream unavailable");
        let err = verifier.check(RECIPIENT).await.unwrap_err();
        assert!(matches!(err, EligibilityError::Rpc { network: Network::ArbMainnet, .. }));
    }
}
