//! Faucet configuration.
use crate::{
    constants::{
        DEFAULT_ALLOWED_ORIGIN, DEFAULT_BASE_FEE_FLOOR, DEFAULT_MAX_CONNECTIONS,
        DEFAULT_METRICS_PORT, DEFAULT_MIN_ELIGIBLE_BALANCE, DEFAULT_PORT,
        DEFAULT_PRIORITY_FEE_INCREMENT, DEFAULT_RPC_TIMEOUT, DEFAULT_SNAPSHOT_TIMESTAMP,
    },
    error::ValidationError,
    types::{Network, PlannedTransfer, TokenKind, TokenSpec, Transfer},
};
use alloy::{
    eips::eip1559::Eip1559Estimation,
    primitives::{Address, U256, address, map::HashMap, uint},
};
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

/// Faucet configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FaucetConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chains tokens are distributed on.
    #[serde(default)]
    pub chains: HashMap<Network, ChainConfig>,
    /// Chain used for requests that do not name any chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_chain: Option<Network>,
    /// Eligibility policy.
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    /// RPC endpoints of reference networks used for eligibility checks.
    #[serde(default)]
    pub endpoints: HashMap<Network, Url>,
    /// Claim ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Transaction configuration.
    #[serde(default)]
    pub transactions: TransactionConfig,
    /// Secrets.
    #[serde(skip_serializing, default)]
    pub secrets: SecretsConfig,
}

impl FaucetConfig {
    /// Sets the IP address to serve the RPC on.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.server.address = address;
        self
    }

    /// Sets the port to serve the RPC on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Sets the port to serve the metrics on.
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.server.metrics_port = port;
        self
    }

    /// Sets the maximum number of concurrent connections.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.server.max_connections = max_connections;
        self
    }

    /// Sets the origins allowed to call the faucet from a browser.
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        if !origins.is_empty() {
            self.server.allowed_origins = origins;
        }
        self
    }

    /// Sets RPC endpoints.
    ///
    /// Endpoints of testnets configure a distribution chain, falling back to the default token
    /// table if the chain is not configured yet. Endpoints of mainnets are used as eligibility
    /// references.
    pub fn with_endpoints(mut self, endpoints: impl IntoIterator<Item = (Network, Url)>) -> Self {
        for (network, endpoint) in endpoints {
            if network.is_mainnet() {
                self.endpoints.insert(network, endpoint);
            } else {
                self.chains
                    .entry(network)
                    .and_modify(|chain| chain.endpoint = endpoint.clone())
                    .or_insert_with(|| ChainConfig::with_default_tokens(network, endpoint));
            }
        }
        self
    }

    /// Sets the default chain.
    pub fn with_default_chain(mut self, chain: Option<Network>) -> Self {
        self.default_chain = chain.or(self.default_chain);
        self
    }

    /// Sets the eligibility policy.
    pub fn with_eligibility(mut self, eligibility: EligibilityConfig) -> Self {
        self.eligibility = eligibility;
        self
    }

    /// Sets the directory holding the claim ledger files.
    pub fn with_ledger_directory(mut self, directory: Option<PathBuf>) -> Self {
        if let Some(directory) = directory {
            self.ledger.directory = directory;
        }
        self
    }

    /// Sets the timeout of RPC requests and dispatched transfers.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.transactions.rpc_timeout = timeout;
        self
    }

    /// Sets the private key of the funding wallet.
    pub fn with_funding_key(mut self, funding_key: Option<String>) -> Self {
        if let Some(funding_key) = funding_key {
            self.secrets.funding_key = funding_key;
        }
        self
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolves the chains of a request.
    ///
    /// Returns the deduplicated chains and whether the request falls back to the default chain.
    pub fn resolve_chains(
        &self,
        chains: Option<&[Network]>,
    ) -> Result<(Vec<Network>, bool), ValidationError> {
        let Some(chains) = chains else {
            let chain = self.default_chain.ok_or(ValidationError::NoChains)?;
            return Ok((vec![chain], true));
        };

        let mut resolved = Vec::with_capacity(chains.len());
        for chain in chains {
            if !self.chains.contains_key(chain) {
                return Err(ValidationError::UnsupportedChain(*chain));
            }
            if !resolved.contains(chain) {
                resolved.push(*chain);
            }
        }

        if resolved.is_empty() {
            return Err(ValidationError::NoChains);
        }

        Ok((resolved, false))
    }

    /// Networks queried by the eligibility policy.
    pub fn reference_networks(&self) -> Vec<Network> {
        match &self.eligibility {
            EligibilityConfig::Open => Vec::new(),
            EligibilityConfig::AnyBalance { networks } => networks.clone(),
            EligibilityConfig::MinBalance { network, .. } => vec![*network],
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The port to serve the metrics on.
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the faucet can handle.
    pub max_connections: u32,
    /// Origins allowed to make cross-origin requests.
    ///
    /// Any origin is allowed if empty.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        }
    }
}

/// Configuration of a chain tokens are distributed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The RPC endpoint of the chain.
    pub endpoint: Url,
    /// Tokens distributed on this chain.
    pub tokens: HashMap<TokenKind, TokenSpec>,
    /// Distributor contract sending the contract token and the native asset in one call.
    ///
    /// If set, every claim on this chain goes through the distributor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distributor: Option<Address>,
    /// Fee settings for this chain.
    #[serde(default)]
    pub fees: FeeConfig,
}

impl ChainConfig {
    /// Creates a chain config with the default token table of `network`.
    pub fn with_default_tokens(network: Network, endpoint: Url) -> Self {
        const ETHER: U256 = uint!(1000000000000000000_U256);
        const MILLI: U256 = uint!(1000000000000000_U256);

        let ovl = match network {
            Network::ArbSepolia => Some(address!("0x3E27fAe625f25291bFda517f74bf41DC40721dA2")),
            Network::Bartio => Some(address!("0x97576e088f0d05EF68cac2EEc63d017FE90952a0")),
            Network::Imola => Some(address!("0x0CebFBa48065B42d47c7C1Ef0db6E1c83091A833")),
            Network::BnbTestnet => Some(address!("0xb880e767739a82eb716780bdfdbc1ed7b23bdb38")),
            _ => None,
        };
        let eth = match network {
            Network::Bartio => Some(ETHER / U256::from(10)),
            Network::BnbTestnet => Some(MILLI * U256::from(30)),
            Network::ArbSepolia | Network::Imola => Some(MILLI * U256::from(3)),
            _ => None,
        };

        let mut tokens = HashMap::default();
        if let Some(amount) = eth {
            tokens.insert(TokenKind::Eth, TokenSpec::native(amount));
        }
        if let Some(address) = ovl {
            tokens.insert(TokenKind::Ovl, TokenSpec::contract(address, ETHER * U256::from(50)));
        }

        Self {
            endpoint,
            tokens,
            // The OVL contract on Imola doubles as the distributor.
            distributor: (network == Network::Imola).then_some(ovl).flatten(),
            fees: FeeConfig::default(),
        }
    }

    /// Returns the transfer settings of `token`.
    pub fn token(&self, token: TokenKind) -> Option<&TokenSpec> {
        self.tokens.get(&token)
    }

    /// Plans the transfers needed to distribute `tokens` on `chain`.
    ///
    /// With a distributor all tokens go out in a single transfer, otherwise every token gets its
    /// own transfer in the order given.
    pub fn plan_transfers(
        &self,
        chain: Network,
        tokens: &[TokenKind],
    ) -> Result<Vec<PlannedTransfer>, ValidationError> {
        let spec = |token: TokenKind| {
            self.token(token).ok_or(ValidationError::UnsupportedToken { token, chain })
        };

        if let Some(distributor) = self.distributor {
            if tokens.is_empty() {
                return Ok(Vec::new());
            }

            let mut native_amount = U256::ZERO;
            let mut token_amount = U256::ZERO;
            for token in tokens {
                let amount = spec(*token)?.amount;
                if token.is_native() { native_amount = amount } else { token_amount = amount }
            }

            return Ok(vec![PlannedTransfer {
                tokens: tokens.to_vec(),
                transfer: Transfer::Combined { distributor, token_amount, native_amount },
            }]);
        }

        tokens
            .iter()
            .map(|token| {
                let spec = spec(*token)?;
                let transfer = match spec.address {
                    _ if token.is_native() => Transfer::Native { amount: spec.amount },
                    Some(address) => Transfer::Erc20 { token: address, amount: spec.amount },
                    None => {
                        return Err(ValidationError::UnsupportedToken { token: *token, chain });
                    }
                };
                Ok(PlannedTransfer { tokens: vec![*token], transfer })
            })
            .collect()
    }
}

/// Settings that affect fee estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Increment added to the base fee to get the priority fee, in wei.
    pub priority_fee_increment: u128,
    /// Base fee assumed if the latest block does not report one, in wei.
    pub base_fee_floor: u128,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            priority_fee_increment: DEFAULT_PRIORITY_FEE_INCREMENT,
            base_fee_floor: DEFAULT_BASE_FEE_FLOOR,
        }
    }
}

impl FeeConfig {
    /// Estimates EIP-1559 fees from the base fee of the latest block.
    ///
    /// The priority fee is the base fee plus the configured increment, and the fee cap is the
    /// base fee plus the priority fee.
    pub fn estimate_eip1559_fees(&self, base_fee: Option<u64>) -> Eip1559Estimation {
        let base_fee = base_fee.map(u128::from).unwrap_or(self.base_fee_floor);
        let max_priority_fee_per_gas = base_fee.saturating_add(self.priority_fee_increment);

        Eip1559Estimation {
            max_fee_per_gas: base_fee.saturating_add(max_priority_fee_per_gas),
            max_priority_fee_per_gas,
        }
    }
}

/// Eligibility policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EligibilityConfig {
    /// Every recipient is eligible.
    Open,
    /// The recipient must hold a non-zero native balance on at least one of the networks.
    AnyBalance {
        /// Reference networks.
        networks: Vec<Network>,
    },
    /// The recipient must hold at least `minimum` on `network`, both now and at the snapshot.
    MinBalance {
        /// Reference network.
        network: Network,
        /// Minimum native balance, in wei.
        minimum: U256,
        /// Historical point the balance is also checked at.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<SnapshotConfig>,
    },
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self::MinBalance {
            network: Network::BnbMainnet,
            minimum: DEFAULT_MIN_ELIGIBLE_BALANCE,
            snapshot: Some(SnapshotConfig::Timestamp(DEFAULT_SNAPSHOT_TIMESTAMP)),
        }
    }
}

/// A historical point on a reference network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotConfig {
    /// The last block at or before this unix timestamp.
    Timestamp(u64),
    /// A fixed block number.
    Block(u64),
}

/// Claim ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding one ledger file per chain.
    pub directory: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from(".") }
    }
}

/// Transaction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Timeout of a single RPC request, and of a whole dispatched transfer.
    #[serde(with = "crate::serde::duration")]
    pub rpc_timeout: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self { rpc_timeout: DEFAULT_RPC_TIMEOUT }
    }
}

/// Secrets.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Private key of the funding wallet.
    pub funding_key: String,
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig").field("funding_key", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
server:
  address: 0.0.0.0
  port: 3000
  metrics_port: 9000
  max_connections: 100
  allowed_origins:
    - https://app.overlay.market
chains:
  arb-sepolia:
    endpoint: https://sepolia-rollup.arbitrum.io/rpc
    tokens:
      eth:
        amount: "3000000000000000"
      ovl:
        address: "0x3E27fAe625f25291bFda517f74bf41DC40721dA2"
        amount: "50000000000000000000"
  imola:
    endpoint: https://imola.example/rpc
    distributor: "0x0CebFBa48065B42d47c7C1Ef0db6E1c83091A833"
    tokens:
      eth:
        amount: "3000000000000000"
      ovl:
        address: "0x0CebFBa48065B42d47c7C1Ef0db6E1c83091A833"
        amount: "50000000000000000000"
    fees:
      priority_fee_increment: 1000
default_chain: arb-sepolia
eligibility:
  type: min_balance
  network: bnb-mainnet
  minimum: "2000000000000000"
  snapshot:
    timestamp: 1747144800
endpoints:
  bnb-mainnet: https://bsc-dataseed.bnbchain.org
ledger:
  directory: /var/lib/faucet
transactions:
  rpc_timeout: 10
"#;

    #[test]
    fn test_config_yaml() {
        let config = serde_yaml::from_str::<FaucetConfig>(CONFIG).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.default_chain, Some(Network::ArbSepolia));
        assert_eq!(config.ledger.directory, PathBuf::from("/var/lib/faucet"));
        assert_eq!(config.transactions.rpc_timeout, Duration::from_secs(10));
        assert_eq!(config.eligibility, EligibilityConfig::default());
        assert_eq!(config.reference_networks(), vec![Network::BnbMainnet]);

        let imola = &config.chains[&Network::Imola];
        assert_eq!(
            imola.distributor,
            Some(address!("0x0CebFBa48065B42d47c7C1Ef0db6E1c83091A833"))
        );
        assert_eq!(
            imola.fees,
            FeeConfig { priority_fee_increment: 1000, base_fee_floor: DEFAULT_BASE_FEE_FLOOR }
        );

        let arb = &config.chains[&Network::ArbSepolia];
        assert_eq!(
            arb,
            &ChainConfig::with_default_tokens(
                Network::ArbSepolia,
                "https://sepolia-rollup.arbitrum.io/rpc".parse().unwrap()
            )
        );
    }

    #[test]
    fn test_any_balance_yaml() {
        let s = r#"
type: any_balance
networks:
  - eth-mainnet
  - arb-mainnet
"#;
        let config = serde_yaml::from_str::<EligibilityConfig>(s).unwrap();
        assert_eq!(
            config,
            EligibilityConfig::AnyBalance {
                networks: vec![Network::EthMainnet, Network::ArbMainnet]
            }
        );
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let config = FaucetConfig::default().with_funding_key(Some("0xdead".to_string()));
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("0xdead"));

        let config = serde_yaml::from_str::<FaucetConfig>(&yaml).unwrap();
        assert!(config.secrets.funding_key.is_empty());

        let config = config.with_funding_key(Some("0xdead".to_string()));
        assert!(!format!("{config:?}").contains("0xdead"));
    }

    #[test]
    fn test_with_endpoints() {
        let config = FaucetConfig::default().with_endpoints([
            (Network::BnbTestnet, "https://testnet.example".parse().unwrap()),
            (Network::BnbMainnet, "https://mainnet.example".parse().unwrap()),
        ]);

        assert_eq!(config.chains.len(), 1);
        assert_eq!(
            config.chains[&Network::BnbTestnet].token(TokenKind::Eth),
            Some(&TokenSpec::native(uint!(30000000000000000_U256)))
        );
        assert_eq!(
            config.endpoints.get(&Network::BnbMainnet),
            Some(&"https://mainnet.example".parse().unwrap())
        );

        // updating the endpoint keeps the configured tokens
        let mut config = config;
        config
            .chains
            .get_mut(&Network::BnbTestnet)
            .unwrap()
            .tokens
            .remove(&TokenKind::Ovl);
        let config = config
            .with_endpoints([(Network::BnbTestnet, "https://other.example".parse().unwrap())]);
        let chain = &config.chains[&Network::BnbTestnet];
        assert_eq!(chain.endpoint.as_str(), "https://other.example/");
        assert!(chain.token(TokenKind::Ovl).is_none());
    }

    #[test]
    fn test_resolve_chains() {
        let config = serde_yaml::from_str::<FaucetConfig>(CONFIG).unwrap();

        assert_eq!(config.resolve_chains(None), Ok((vec![Network::ArbSepolia], true)));
        assert_eq!(
            config.resolve_chains(Some(
                [Network::Imola, Network::ArbSepolia, Network::Imola].as_slice()
            )),
            Ok((vec![Network::Imola, Network::ArbSepolia], false))
        );
        assert_eq!(
            config.resolve_chains(Some([Network::Bartio].as_slice())),
            Err(ValidationError::UnsupportedChain(Network::Bartio))
        );
        assert_eq!(config.resolve_chains(Some([].as_slice())), Err(ValidationError::NoChains));

        let config = FaucetConfig { default_chain: None, ..config };
        assert_eq!(config.resolve_chains(None), Err(ValidationError::NoChains));
    }

    #[test]
    fn test_plan_separate_transfers() {
        let chain = ChainConfig::with_default_tokens(
            Network::ArbSepolia,
            "http://localhost:8545".parse().unwrap(),
        );

        let planned =
            chain.plan_transfers(Network::ArbSepolia, &[TokenKind::Eth, TokenKind::Ovl]).unwrap();
        assert_eq!(
            planned,
            vec![
                PlannedTransfer {
                    tokens: vec![TokenKind::Eth],
                    transfer: Transfer::Native { amount: uint!(3000000000000000_U256) },
                },
                PlannedTransfer {
                    tokens: vec![TokenKind::Ovl],
                    transfer: Transfer::Erc20 {
                        token: address!("0x3E27fAe625f25291bFda517f74bf41DC40721dA2"),
                        amount: uint!(50000000000000000000_U256),
                    },
                },
            ]
        );
    }

    #[test]
    fn test_plan_combined_transfer() {
        let chain =
            ChainConfig::with_default_tokens(Network::Imola, "http://localhost:8545".parse().unwrap());
        let distributor = address!("0x0CebFBa48065B42d47c7C1Ef0db6E1c83091A833");

        let planned =
            chain.plan_transfers(Network::Imola, &[TokenKind::Ovl, TokenKind::Eth]).unwrap();
        assert_eq!(
            planned,
            vec![PlannedTransfer {
                tokens: vec![TokenKind::Ovl, TokenKind::Eth],
                transfer: Transfer::Combined {
                    distributor,
                    token_amount: uint!(50000000000000000000_U256),
                    native_amount: uint!(3000000000000000_U256),
                },
            }]
        );

        let planned = chain.plan_transfers(Network::Imola, &[TokenKind::Eth]).unwrap();
        assert_eq!(
            planned[0].transfer,
            Transfer::Combined {
                distributor,
                token_amount: U256::ZERO,
                native_amount: uint!(3000000000000000_U256),
            }
        );

        assert!(chain.plan_transfers(Network::Imola, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_plan_rejects_unconfigured_token() {
        let mut chain = ChainConfig::with_default_tokens(
            Network::Bartio,
            "http://localhost:8545".parse().unwrap(),
        );
        chain.tokens.remove(&TokenKind::Ovl);

        assert_eq!(
            chain.plan_transfers(Network::Bartio, &[TokenKind::Eth, TokenKind::Ovl]),
            Err(ValidationError::UnsupportedToken {
                token: TokenKind::Ovl,
                chain: Network::Bartio
            })
        );
    }

    #[test]
    fn test_fee_estimation() {
        let fees = FeeConfig::default();

        let estimate = fees.estimate_eip1559_fees(Some(3_000_000_000));
        assert_eq!(estimate.max_priority_fee_per_gas, 5_000_000_000);
        assert_eq!(estimate.max_fee_per_gas, 8_000_000_000);

        // falls back to the floor
        let estimate = fees.estimate_eip1559_fees(None);
        assert_eq!(estimate.max_priority_fee_per_gas, 3_000_000_000);
        assert_eq!(estimate.max_fee_per_gas, 4_000_000_000);
    }
}
