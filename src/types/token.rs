//! Token kinds handed out by the faucet.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A kind of token distributed by the faucet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// The native asset of the chain.
    Eth,
    /// The OVL ERC-20 token.
    Ovl,
}

impl TokenKind {
    /// Returns the lowercase identifier of the token.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eth => "eth",
            Self::Ovl => "ovl",
        }
    }

    /// Whether this is the native asset of the chain.
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Eth)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer settings for a token on a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    /// Amount sent per claim, in base units.
    pub amount: U256,
    /// The token contract. Absent for the native asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl TokenSpec {
    /// A native asset transfer of `amount`.
    pub const fn native(amount: U256) -> Self {
        Self { amount, address: None }
    }

    /// A contract transfer of `amount` on `address`.
    pub const fn contract(address: Address, amount: U256) -> Self {
        Self { amount, address: Some(address) }
    }
}
