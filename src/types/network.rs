//! Networks known to the faucet.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A network the faucet can talk to.
///
/// This covers both the testnets tokens are distributed on and the mainnets that are only used as
/// a reference for eligibility checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    /// Arbitrum Sepolia.
    ArbSepolia,
    /// Berachain bArtio.
    Bartio,
    /// Imola.
    Imola,
    /// BNB Smart Chain testnet.
    BnbTestnet,
    /// Ethereum mainnet.
    EthMainnet,
    /// Arbitrum One.
    ArbMainnet,
    /// BNB Smart Chain mainnet.
    BnbMainnet,
}

impl Network {
    /// All known networks.
    pub const ALL: [Self; 7] = [
        Self::ArbSepolia,
        Self::Bartio,
        Self::Imola,
        Self::BnbTestnet,
        Self::EthMainnet,
        Self::ArbMainnet,
        Self::BnbMainnet,
    ];

    /// Returns the kebab-case identifier of the network.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ArbSepolia => "arb-sepolia",
            Self::Bartio => "bartio",
            Self::Imola => "imola",
            Self::BnbTestnet => "bnb-testnet",
            Self::EthMainnet => "eth-mainnet",
            Self::ArbMainnet => "arb-mainnet",
            Self::BnbMainnet => "bnb-mainnet",
        }
    }

    /// Returns the symbol of the native asset.
    pub const fn native_symbol(&self) -> &'static str {
        match self {
            Self::Bartio => "BERA",
            Self::BnbTestnet | Self::BnbMainnet => "BNB",
            _ => "ETH",
        }
    }

    /// Whether this is a mainnet, only used as an eligibility reference.
    pub const fn is_mainnet(&self) -> bool {
        matches!(self, Self::EthMainnet | Self::ArbMainnet | Self::BnbMainnet)
    }

    /// Name of the ledger file of this network.
    ///
    /// Arbitrum Sepolia was the only chain of the first deployment and keeps its unprefixed file.
    pub fn ledger_file_name(&self) -> String {
        match self {
            Self::ArbSepolia => "alreadyClaimed.json".to_string(),
            other => format!("{other}_alreadyClaimed.json"),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|network| network.as_str() == s)
            .ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_identifier() {
        for network in Network::ALL {
            assert_eq!(network.as_str().parse::<Network>().unwrap(), network);
            assert_eq!(
                serde_json::to_string(&network).unwrap(),
                format!("\"{}\"", network.as_str())
            );
        }
        assert!("testnet".parse::<Network>().is_err());
    }

    #[test]
    fn ledger_file_names() {
        assert_eq!(Network::ArbSepolia.ledger_file_name(), "alreadyClaimed.json");
        assert_eq!(Network::BnbTestnet.ledger_file_name(), "bnb-testnet_alreadyClaimed.json");
    }
}
