//! Faucet spawn utilities.
use crate::{
    cli::Args,
    config::FaucetConfig,
    eligibility::EligibilityVerifier,
    faucet::FaucetService,
    ledger::{ClaimLedger, LedgerStorage},
    metrics::{self, RpcMetricsService},
    nonce::NonceSequencer,
    rpc::{FaucetApiServer, FaucetRpc},
    signers::DynSigner,
    transactions::{ChainDispatcher, Dispatcher},
    transport::connect_http,
    types::Network,
};
use alloy::primitives::map::HashMap;
use eyre::Context;
use http::{HeaderValue, Method, header};
use itertools::Itertools;
use jsonrpsee::server::{
    RpcServiceBuilder, Server, ServerHandle, middleware::http::ProxyGetRequestLayer,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Context returned once the faucet is launched.
#[derive(Debug, Clone)]
pub struct FaucetHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to RPC server.
    pub server: ServerHandle,
    /// The faucet service.
    pub faucet: FaucetService,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
}

impl FaucetHandle {
    /// Returns the url to the http server
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

/// Attempts to spawn the faucet service using CLI arguments and a configuration file.
pub async fn try_spawn_with_args<P: AsRef<Path>>(
    args: Args,
    config_path: P,
) -> eyre::Result<FaucetHandle> {
    let config = if !config_path.as_ref().exists() {
        let config = args.merge_faucet_config(FaucetConfig::default());
        config.save_to_file(&config_path)?;
        config
    } else {
        // File exists: load and override with CLI values.
        args.merge_faucet_config(FaucetConfig::load_from_file(&config_path)?)
    };

    try_spawn(config).await
}

/// Spawns the faucet service using the provided [`FaucetConfig`].
pub async fn try_spawn(config: FaucetConfig) -> eyre::Result<FaucetHandle> {
    let metrics = metrics::setup_exporter((config.server.address, config.server.metrics_port))?;

    let signer = DynSigner::from_signing_key(&config.secrets.funding_key)
        .wrap_err("invalid funding key")?;
    let timeout = config.transactions.rpc_timeout;

    // construct dispatchers, sharing one nonce sequence per chain
    if config.chains.is_empty() {
        warn!("No distribution chains configured");
    }
    let nonces = NonceSequencer::default();
    let dispatchers: HashMap<Network, Arc<dyn Dispatcher>> =
        futures_util::future::try_join_all(config.chains.iter().map(|(network, chain)| {
            let provider = connect_http(*network, chain.endpoint.clone(), timeout);
            let signer = signer.clone();
            let nonces = nonces.clone();
            async move {
                let dispatcher = ChainDispatcher::new(
                    *network,
                    provider,
                    signer,
                    nonces,
                    chain.fees.clone(),
                    timeout,
                )
                .await
                .wrap_err_with(|| format!("failed to connect to {network}"))?;
                Ok::<_, eyre::Error>((*network, Arc::new(dispatcher) as Arc<dyn Dispatcher>))
            }
        }))
        .await?
        .into_iter()
        .collect();

    // construct eligibility verifier
    let reference_providers = config
        .endpoints
        .iter()
        .map(|(network, endpoint)| (*network, connect_http(*network, endpoint.clone(), timeout)))
        .collect();
    let eligibility = EligibilityVerifier::new(config.eligibility.clone(), reference_providers)?;

    // construct ledger
    info!(directory = %config.ledger.directory.display(), "Using file claim ledger");
    let ledger = ClaimLedger::new(LedgerStorage::file(&config.ledger.directory));

    let faucet = FaucetService::new(config.clone(), dispatchers, Arc::new(eligibility), ledger);
    let rpc = FaucetRpc::new(faucet.clone()).into_rpc();

    // http layers
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = if config.server.allowed_origins.is_empty() {
        cors.allow_origin(AllowOrigin::any())
    } else {
        let origins = config
            .server
            .allowed_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("invalid allowed origin")?;
        cors.allow_origin(AllowOrigin::list(origins)).allow_credentials(true)
    };

    // start server
    let server = Server::builder()
        .http_only()
        .max_connections(config.server.max_connections)
        .set_http_middleware(
            ServiceBuilder::new()
                .layer(cors)
                .layer(ProxyGetRequestLayer::new("/health", "health")?),
        )
        .set_rpc_middleware(RpcServiceBuilder::new().layer_fn(RpcMetricsService::new))
        .build((config.server.address, config.server.port))
        .await?;
    let addr = server.local_addr()?;
    info!(%addr, "Started faucet service");
    info!("Funding wallet: {}", signer.address());
    info!("Distribution chains: {}", config.chains.keys().sorted().join(", "));

    Ok(FaucetHandle { local_addr: addr, server: server.start(rpc), faucet, metrics })
}
