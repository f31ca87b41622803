//! RPC transport for chain providers.

use crate::types::Network;
use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::ClientBuilder,
    transports::layers::RetryBackoffLayer,
};
use std::time::Duration;
use url::Url;

mod layer;
pub use layer::{NetworkLayer, NetworkTransport, RequestTimeout};

/// [`RetryBackoffLayer`] used for chain providers.
///
/// We are allowing max 10 retries with a backoff of 800ms. The CU/s is set to max value to avoid
/// any throttling.
pub const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 800, u64::MAX);

/// Creates a provider for `network` talking HTTP to `endpoint`.
///
/// Every attempt is bounded by `timeout`, and rate limited requests are retried.
///
/// Nonces, fees and gas are set by the caller, so no fillers are installed.
pub fn connect_http(network: Network, endpoint: Url, timeout: Duration) -> DynProvider {
    let client = ClientBuilder::default()
        .layer(RETRY_LAYER)
        .layer(NetworkLayer::new(network, timeout))
        .http(endpoint);

    ProviderBuilder::new().disable_recommended_fillers().connect_client(client).erased()
}
