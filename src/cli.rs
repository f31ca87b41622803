//! # Faucet CLI
use crate::{
    config::FaucetConfig,
    constants::{DEFAULT_MAX_CONNECTIONS, DEFAULT_METRICS_PORT, DEFAULT_PORT},
    spawn::try_spawn_with_args,
    types::Network,
};
use clap::Parser;
use eyre::OptionExt;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    time::Duration,
};
use url::Url;

/// The faucet service distributes testnet tokens to eligible recipients.
#[derive(Debug, Parser)]
#[command(author, about = "Faucet", long_about = None)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one will be used and stored in the working directory under
    /// `faucet.yaml`.
    #[arg(long, value_name = "CONFIG", env = "FAUCET_CONFIG", default_value = "faucet.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(long = "http.addr", value_name = "ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub address: IpAddr,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT", env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// The port to serve the metrics on.
    #[arg(long = "http.metrics-port", value_name = "PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the faucet can handle.
    #[arg(long = "max-connections", value_name = "NUM", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
    /// An origin allowed to call the faucet from a browser.
    ///
    /// Keeps the configured origins if not given.
    #[arg(long = "allowed-origin", value_name = "ORIGIN")]
    pub allowed_origins: Vec<String>,
    /// The private key of the funding wallet.
    #[arg(long = "funding-key", value_name = "SECRET_KEY", env = "PRIVATE_KEY")]
    pub funding_key: Option<String>,
    /// The RPC endpoint of a network, in a format of "network:url".
    ///
    /// Endpoints of testnets enable distribution on that chain, endpoints of mainnets are used for
    /// eligibility checks.
    #[arg(long = "endpoint", value_name = "NETWORK:URL", value_parser = parse_network_url)]
    pub endpoints: Vec<(Network, Url)>,
    /// The RPC endpoint of Arbitrum Sepolia.
    #[arg(long = "arb-sepolia-endpoint", value_name = "URL", env = "SEPOLIA_PROVIDER_URL")]
    pub arb_sepolia_endpoint: Option<Url>,
    /// The RPC endpoint of Berachain bArtio.
    #[arg(long = "bartio-endpoint", value_name = "URL", env = "BARTIO_PROVIDER_URL")]
    pub bartio_endpoint: Option<Url>,
    /// The RPC endpoint of Imola.
    #[arg(long = "imola-endpoint", value_name = "URL", env = "IMOLA_PROVIDER_URL")]
    pub imola_endpoint: Option<Url>,
    /// The RPC endpoint of BNB Smart Chain testnet.
    #[arg(long = "bnb-testnet-endpoint", value_name = "URL", env = "BNB_TESTNET_PROVIDER_URL")]
    pub bnb_testnet_endpoint: Option<Url>,
    /// The RPC endpoint of Ethereum mainnet.
    #[arg(long = "eth-mainnet-endpoint", value_name = "URL", env = "ETH_MAINNET_PROVIDER_URL")]
    pub eth_mainnet_endpoint: Option<Url>,
    /// The RPC endpoint of Arbitrum One.
    #[arg(long = "arb-mainnet-endpoint", value_name = "URL", env = "ARB_MAINNET_PROVIDER_URL")]
    pub arb_mainnet_endpoint: Option<Url>,
    /// The RPC endpoint of BNB Smart Chain mainnet.
    #[arg(long = "bnb-mainnet-endpoint", value_name = "URL", env = "BNB_MAINNET_PROVIDER_URL")]
    pub bnb_mainnet_endpoint: Option<Url>,
    /// The chain used for requests that do not name any chain.
    #[arg(long = "default-chain", value_name = "NETWORK")]
    pub default_chain: Option<Network>,
    /// The directory holding the claim ledger files.
    #[arg(long = "ledger-dir", value_name = "DIR", env = "FAUCET_LEDGER_DIR")]
    pub ledger_directory: Option<PathBuf>,
    /// The timeout of RPC requests and dispatched transfers.
    #[arg(long = "rpc-timeout", value_name = "SECONDS", value_parser = parse_duration_secs, default_value = "30")]
    pub rpc_timeout: Duration,
}

impl Args {
    /// Run the faucet service.
    pub async fn run(self) -> eyre::Result<()> {
        let config_path = self.config.clone();
        try_spawn_with_args(self, &config_path).await?.server.stopped().await;

        Ok(())
    }

    /// Returns all endpoints given on the command line or in the environment.
    fn endpoints(&self) -> Vec<(Network, Url)> {
        [
            (Network::ArbSepolia, &self.arb_sepolia_endpoint),
            (Network::Bartio, &self.bartio_endpoint),
            (Network::Imola, &self.imola_endpoint),
            (Network::BnbTestnet, &self.bnb_testnet_endpoint),
            (Network::EthMainnet, &self.eth_mainnet_endpoint),
            (Network::ArbMainnet, &self.arb_mainnet_endpoint),
            (Network::BnbMainnet, &self.bnb_mainnet_endpoint),
        ]
        .into_iter()
        .filter_map(|(network, endpoint)| Some((network, endpoint.clone()?)))
        .chain(self.endpoints.iter().cloned())
        .collect()
    }

    /// Merges [`Args`] values into an existing [`FaucetConfig`] instance.
    pub fn merge_faucet_config(self, config: FaucetConfig) -> FaucetConfig {
        let endpoints = self.endpoints();
        config
            .with_endpoints(endpoints)
            .with_address(self.address)
            .with_port(self.port)
            .with_metrics_port(self.metrics_port)
            .with_max_connections(self.max_connections)
            .with_allowed_origins(self.allowed_origins)
            .with_funding_key(self.funding_key)
            .with_default_chain(self.default_chain)
            .with_ledger_directory(self.ledger_directory)
            .with_rpc_timeout(self.rpc_timeout)
    }
}

/// Parses a string representing seconds to a [`Duration`].
fn parse_duration_secs(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

/// Parses a string representing a pair of network and a url in a format of "network:url".
fn parse_network_url(arg: &str) -> eyre::Result<(Network, Url)> {
    let (network, url) = arg.split_once(':').ok_or_eyre("expected network:url argument")?;

    Ok((network.parse()?, url.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_network_urls() {
        let (network, url) = parse_network_url("bnb-testnet:https://testnet.example/rpc").unwrap();
        assert_eq!(network, Network::BnbTestnet);
        assert_eq!(url.as_str(), "https://testnet.example/rpc");

        assert!(parse_network_url("goerli:https://goerli.example").is_err());
        assert!(parse_network_url("https").is_err());
    }

    #[test]
    fn merges_into_config() {
        let args = Args::try_parse_from([
            "faucet",
            "--http.port",
            "8080",
            "--endpoint",
            "imola:http://localhost:8545",
            "--endpoint",
            "bnb-mainnet:http://localhost:8546",
            "--default-chain",
            "imola",
            "--rpc-timeout",
            "5",
        ])
        .unwrap();
        let config = args.merge_faucet_config(FaucetConfig::default());

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.default_chain, Some(Network::Imola));
        assert_eq!(config.transactions.rpc_timeout, Duration::from_secs(5));
        assert!(config.chains.contains_key(&Network::Imola));
        assert!(config.endpoints.contains_key(&Network::BnbMainnet));
    }
}
