//! Claims and the transfers that fulfil them.

use super::{IERC20, ITokenDistributor, Network, TokenKind};
use alloy::{
    network::TransactionBuilder,
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A claim of a single token kind on a single chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimKey {
    /// The chain the token is distributed on.
    pub chain: Network,
    /// The token kind.
    pub token: TokenKind,
}

impl ClaimKey {
    /// Creates a new [`ClaimKey`].
    pub const fn new(chain: Network, token: TokenKind) -> Self {
        Self { chain, token }
    }

    /// The key used for this claim in a response.
    ///
    /// Single-chain requests are keyed by token alone.
    pub fn response_key(&self, single_chain: bool) -> String {
        if single_chain { self.token.to_string() } else { self.to_string() }
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.chain, self.token)
    }
}

/// Result of a single claim, as reported to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ClaimOutcome {
    /// The transfer was submitted.
    Success {
        /// Hash of the submitted transaction.
        #[serde(rename = "txHash")]
        tx_hash: TxHash,
    },
    /// The claim was not fulfilled.
    Error {
        /// User-facing reason.
        reason: String,
    },
}

impl ClaimOutcome {
    /// Creates an error outcome.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error { reason: reason.into() }
    }

    /// Whether the claim was fulfilled.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// An on-chain transfer from the funding wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// Plain value transfer of the native asset.
    Native {
        /// Amount in wei.
        amount: U256,
    },
    /// ERC-20 `transfer` call.
    Erc20 {
        /// Token contract.
        token: Address,
        /// Amount in token base units.
        amount: U256,
    },
    /// A single distributor call sending both the contract token and the native asset.
    Combined {
        /// Distributor contract.
        distributor: Address,
        /// Amount of the contract token.
        token_amount: U256,
        /// Amount of the native asset.
        native_amount: U256,
    },
}

impl Transfer {
    /// Builds the transaction request paying out to `recipient`.
    ///
    /// Nonce, fees and sender are left unset.
    pub fn to_transaction_request(&self, recipient: Address) -> TransactionRequest {
        match *self {
            Self::Native { amount } => {
                TransactionRequest::default().with_to(recipient).with_value(amount)
            }
            Self::Erc20 { token, amount } => TransactionRequest::default()
                .with_to(token)
                .with_input(IERC20::transferCall { to: recipient, amount }.abi_encode()),
            Self::Combined { distributor, token_amount, native_amount } => {
                TransactionRequest::default().with_to(distributor).with_input(
                    ITokenDistributor::distributeTokensAndEthCall {
                        recipient,
                        tokenAmount: token_amount,
                        ethAmount: native_amount,
                    }
                    .abi_encode(),
                )
            }
        }
    }
}

/// A transfer together with the claims it fulfils.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransfer {
    /// Claimed token kinds covered by the transfer.
    pub tokens: Vec<TokenKind>,
    /// The transfer.
    pub transfer: Transfer,
}
