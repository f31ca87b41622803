use crate::types::Network;
use alloy::transports::{RpcError, TransportErrorKind};

/// Errors which may occur while checking eligibility.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityError {
    /// No provider is configured for a reference network.
    #[error("no endpoint configured for reference network {0}")]
    MissingProvider(Network),
    /// A balance or block query failed.
    #[error("could not query {network}: {source}")]
    Rpc {
        /// The reference network.
        network: Network,
        /// The underlying RPC error.
        source: RpcError<TransportErrorKind>,
    },
}
