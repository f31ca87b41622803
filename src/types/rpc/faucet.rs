//! RPC faucet-related request and response types.

use crate::types::{ClaimKey, ClaimOutcome, Network, TokenKind};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters for the `faucet_requestTokens` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTokensParameters {
    /// Token kinds requested.
    pub tokens: Vec<TokenKind>,
    /// Chains to distribute on.
    ///
    /// If absent, the configured default chain is used and the response is keyed by token only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chains: Option<Vec<Network>>,
    /// The address to send tokens to.
    pub recipient: Address,
}

/// Response for the `faucet_requestTokens` method.
///
/// Maps `"<chain>-<token>"`, or `"<token>"` for single-chain requests, to the claim outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestTokensResponse(pub BTreeMap<String, ClaimOutcome>);

impl RequestTokensResponse {
    /// Records the outcome of a claim.
    pub fn insert(&mut self, key: &ClaimKey, single_chain: bool, outcome: ClaimOutcome) {
        self.0.insert(key.response_key(single_chain), outcome);
    }

    /// Returns the outcome recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&ClaimOutcome> {
        self.0.get(key)
    }

    /// Number of recorded outcomes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no outcome was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parameters for the `faucet_getClaimed` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetClaimedParameters {
    /// The chain to look up.
    pub chain: Network,
    /// The recipient to look up.
    pub recipient: Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn request_without_chains() {
        let params: RequestTokensParameters = serde_json::from_str(
            r#"{"tokens":["eth","ovl"],"recipient":"0x00000000000000000000000000000000000000aa"}"#,
        )
        .unwrap();

        assert_eq!(params.tokens, vec![TokenKind::Eth, TokenKind::Ovl]);
        assert_eq!(params.chains, None);
        assert_eq!(params.recipient, address!("0x00000000000000000000000000000000000000aa"));
    }

    #[test]
    fn request_with_chains() {
        let params: RequestTokensParameters = serde_json::from_str(
            r#"{"tokens":["eth"],"chains":["imola","bnb-testnet"],"recipient":"0x00000000000000000000000000000000000000aa"}"#,
        )
        .unwrap();

        assert_eq!(params.chains, Some(vec![Network::Imola, Network::BnbTestnet]));
    }

    #[test]
    fn rejects_malformed_requests() {
        // unsupported token kind
        assert!(
            serde_json::from_str::<RequestTokensParameters>(
                r#"{"tokens":["btc"],"recipient":"0x00000000000000000000000000000000000000aa"}"#,
            )
            .is_err()
        );
        // malformed address
        assert!(
            serde_json::from_str::<RequestTokensParameters>(
                r#"{"tokens":["eth"],"recipient":"0x1234"}"#,
            )
            .is_err()
        );
    }
}
