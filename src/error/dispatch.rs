use crate::{transport::RequestTimeout, types::Network};
use alloy::transports::{RpcError, TransportErrorKind};
use std::time::Duration;

/// Fragments of node error messages that indicate the nonce was already used or skipped.
const NONCE_CONFLICT_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "invalid nonce",
    "nonce has already been used",
    "already known",
    "replacement transaction underpriced",
    "nonce_expired",
];

/// Errors that may occur while planning or submitting a transfer.
///
/// These never abort a request, they only fail the claims of the affected transfer.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The node rejected the transaction because its nonce collided with another transaction of
    /// the funding account.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),
    /// The transfer did not complete in time.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// The chain has no dispatcher.
    #[error("no dispatcher for chain {0}")]
    UnsupportedChain(Network),
    /// RPC error.
    #[error(transparent)]
    Rpc(RpcError<TransportErrorKind>),
}

impl DispatchError {
    /// Whether re-issuing the request shortly is likely to succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NonceConflict(_) | Self::Timeout(_))
    }
}

impl From<RpcError<TransportErrorKind>> for DispatchError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        if let Some(TransportErrorKind::Custom(custom)) = err.as_transport_err() {
            if let Some(RequestTimeout { timeout, .. }) =
                custom.downcast_ref::<RequestTimeout>()
            {
                return Self::Timeout(*timeout);
            }
        }

        let message = err.to_string();
        if is_nonce_conflict(&message) { Self::NonceConflict(message) } else { Self::Rpc(err) }
    }
}

/// Whether a node error message reports a nonce conflict.
pub fn is_nonce_conflict(message: &str) -> bool {
    let message = message.to_lowercase();
    NONCE_CONFLICT_MARKERS.iter().any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_nonce_conflicts() {
        let err = DispatchError::from(TransportErrorKind::custom_str(
            "server returned an error response: error code -32000: nonce too low",
        ));
        assert!(matches!(err, DispatchError::NonceConflict(_)));
        assert!(err.is_retryable());

        let err = DispatchError::from(TransportErrorKind::custom_str(
            "server returned an error response: error code -32000: insufficient funds for gas",
        ));
        assert!(matches!(err, DispatchError::Rpc(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn request_timeouts_are_retryable() {
        let err = DispatchError::from(TransportErrorKind::custom(RequestTimeout {
            network: Network::ArbSepolia,
            method: "eth_getTransactionCount".to_string(),
            timeout: Duration::from_secs(30),
        }));
        assert!(matches!(err, DispatchError::Timeout(timeout) if timeout == Duration::from_secs(30)));
        assert!(err.is_retryable());

        // only the typed error counts, not a message that looks like one
        let err = DispatchError::from(TransportErrorKind::custom_str("request timed out"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeouts_are_retryable() {
        assert!(DispatchError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!DispatchError::UnsupportedChain(Network::Imola).is_retryable());
    }

    #[test]
    fn nonce_markers_are_case_insensitive() {
        assert!(is_nonce_conflict("NONCE_EXPIRED"));
        assert!(is_nonce_conflict("Replacement transaction underpriced"));
        assert!(!is_nonce_conflict("execution reverted"));
    }
}
