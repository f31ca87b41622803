//! The `faucet_` namespace.

use async_trait::async_trait;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};

use crate::{
    constants::HEALTH_RESPONSE,
    error::ToRpcResult,
    faucet::FaucetService,
    types::{
        TokenKind,
        rpc::{GetClaimedParameters, RequestTokensParameters, RequestTokensResponse},
    },
};

/// Faucet `faucet_` RPC namespace.
#[rpc(server, client, namespace = "faucet")]
pub trait FaucetApi {
    /// Checks that the service is up.
    #[method(name = "health", aliases = ["health"])]
    async fn health(&self) -> RpcResult<String>;

    /// Sends the requested tokens to the recipient on the requested chains.
    ///
    /// If no chains are given, the default chain is used and the response is keyed by token
    /// only. Claims that were already fulfilled or whose transfer failed are reported per claim,
    /// the request as a whole only fails if it is invalid or the recipient is not eligible.
    #[method(name = "requestTokens")]
    async fn request_tokens(
        &self,
        params: RequestTokensParameters,
    ) -> RpcResult<RequestTokensResponse>;

    /// Returns the tokens the recipient already claimed on a chain.
    #[method(name = "getClaimed")]
    async fn get_claimed(&self, params: GetClaimedParameters) -> RpcResult<Vec<TokenKind>>;
}

/// Faucet `faucet_` RPC module.
#[derive(Debug, Clone)]
pub struct FaucetRpc {
    faucet: FaucetService,
}

impl FaucetRpc {
    /// Create a new faucet RPC module.
    pub fn new(faucet: FaucetService) -> Self {
        Self { faucet }
    }
}

#[async_trait]
impl FaucetApiServer for FaucetRpc {
    async fn health(&self) -> RpcResult<String> {
        Ok(HEALTH_RESPONSE.to_string())
    }

    async fn request_tokens(
        &self,
        params: RequestTokensParameters,
    ) -> RpcResult<RequestTokensResponse> {
        self.faucet.request_tokens(params).await.to_rpc_result()
    }

    async fn get_claimed(&self, params: GetClaimedParameters) -> RpcResult<Vec<TokenKind>> {
        self.faucet.get_claimed(params).await.to_rpc_result()
    }
}
