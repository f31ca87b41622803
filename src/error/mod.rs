//! Faucet error types.
use crate::types::{Network, TokenKind};
use alloy::primitives::Bytes;
use core::fmt;
use jsonrpsee::core::RpcResult;
use thiserror::Error;

mod dispatch;
pub use dispatch::DispatchError;

mod eligibility;
pub use eligibility::EligibilityError;

mod ledger;
pub use ledger::LedgerError;

/// The overarching error type returned by `faucet_requestTokens`.
///
/// Every variant aborts the whole request before any ledger or chain mutation.
#[derive(Debug, Error)]
pub enum FaucetError {
    /// The request is not supported by the faucet configuration.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The recipient does not meet the eligibility policy.
    #[error("{0}")]
    Ineligible(String),
    /// Eligibility could not be determined.
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    /// An internal error occurred.
    #[error(transparent)]
    InternalError(#[from] eyre::Error),
}

impl From<FaucetError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: FaucetError) -> Self {
        match err {
            FaucetError::Validation(_) | FaucetError::Ineligible(_) => {
                invalid_params(err.to_string())
            }
            FaucetError::Eligibility(_) | FaucetError::InternalError(_) => internal_rpc(err),
        }
    }
}

/// Errors returned when a request asks for something the faucet does not distribute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The request did not name any token.
    #[error("no tokens requested")]
    NoTokens,
    /// The request did not name any chain and there is no default chain.
    #[error("no chains requested and no default chain is configured")]
    NoChains,
    /// The chain is not configured for distribution.
    #[error("unsupported chain ({0})")]
    UnsupportedChain(Network),
    /// The token is not configured on the chain.
    #[error("token ({token}) is not supported on chain ({chain})")]
    UnsupportedToken {
        /// The requested token.
        token: TokenKind,
        /// The requested chain.
        chain: Network,
    },
}

/// A helper trait to provide an RPC error code.
pub trait ToRpcResult<Ok, Err>: Sized {
    /// Converts result to [`RpcResult`] by converting error variant to
    /// [`jsonrpsee_types::error::ErrorObject`]
    fn to_rpc_result(self) -> RpcResult<Ok>
    where
        Err: fmt::Display;
}

macro_rules! impl_error_helpers {
    ($err:ty) => {
        impl<Ok> ToRpcResult<Ok, $err> for Result<Ok, $err> {
            fn to_rpc_result(self) -> RpcResult<Ok> {
                self.map_err(|err| err.into())
            }
        }

        impl From<$err> for String {
            fn from(err: $err) -> Self {
                err.to_string()
            }
        }
    };
}

impl_error_helpers!(FaucetError);

/// Constructs an invalid params JSON‑RPC error.
fn invalid_params(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INVALID_PARAMS_CODE, msg, None)
}

/// Constructs an internal JSON‑RPC error.
fn internal_rpc(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INTERNAL_ERROR_CODE, msg, None)
}

/// Constructs a JSON‑RPC error with `code`, `message` and optional `data`.
fn rpc_err(
    code: i32,
    msg: impl Into<String>,
    data: Option<Bytes>,
) -> jsonrpsee::types::error::ErrorObject<'static> {
    jsonrpsee::types::error::ErrorObject::owned(code, msg.into(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::types::error::{ErrorObject, INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};

    #[test]
    fn request_errors_map_to_rpc_codes() {
        let err: ErrorObject<'static> =
            FaucetError::from(ValidationError::UnsupportedChain(Network::EthMainnet)).into();
        assert_eq!(err.code(), INVALID_PARAMS_CODE);
        assert_eq!(err.message(), "unsupported chain (eth-mainnet)");

        let err: ErrorObject<'static> = FaucetError::Ineligible("too poor".to_string()).into();
        assert_eq!(err.code(), INVALID_PARAMS_CODE);
        assert_eq!(err.message(), "too poor");

        let err: ErrorObject<'static> = FaucetError::from(eyre::eyre!("boom")).into();
        assert_eq!(err.code(), INTERNAL_ERROR_CODE);
    }
}
