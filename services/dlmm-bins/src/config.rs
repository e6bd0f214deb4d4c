//! Service configuration
//!
//! Layered from built-in defaults, an optional `dlmm-bins.{toml,yaml,json}`
//! file, and `DLMM_BINS__*` environment variables. List values in the
//! environment are comma-separated.

use serde::{Deserialize, Serialize};

use crate::types::Network;

/// Meteora DLMM program (same id on devnet and mainnet)
pub const DLMM_PROGRAM_ID: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";

/// Strategy identifiers, tried in configured order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    OnChain,
    IndexerPaths,
    ListThenMatch,
    SyntheticFromDetail,
    FallbackDemo,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::OnChain => "on_chain",
            StrategyKind::IndexerPaths => "indexer_paths",
            StrategyKind::ListThenMatch => "list_then_match",
            StrategyKind::SyntheticFromDetail => "synthetic_from_detail",
            StrategyKind::FallbackDemo => "fallback_demo",
        }
    }
}

/// One URL per network
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkEndpoints {
    pub devnet: String,
    pub testnet: String,
    pub mainnet: String,
    pub localhost: String,
}

impl NetworkEndpoints {
    pub fn for_network(&self, network: Network) -> &str {
        match network {
            Network::Devnet => &self.devnet,
            Network::Testnet => &self.testnet,
            Network::Mainnet => &self.mainnet,
            Network::Localhost => &self.localhost,
        }
    }

    /// Same URL for every network (tests, single-cluster deployments)
    pub fn uniform(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            devnet: url.clone(),
            testnet: url.clone(),
            mainnet: url.clone(),
            localhost: url,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    /// Pool used when the request names none or an invalid one
    pub default_pool: String,
    pub default_network: Network,
    pub default_radius: u32,
    /// Per outbound call
    pub request_timeout_ms: u64,
    pub price_timeout_ms: u64,
    /// Spot price reported when every price provider fails
    pub fallback_price: f64,
    pub synthetic_bin_step_percent: f64,
    pub dlmm_program_id: String,
    pub rpc: NetworkEndpoints,
    pub indexer: NetworkEndpoints,
    pub jupiter_price_url: String,
    pub coingecko_price_url: String,
    pub strategies: Vec<StrategyKind>,
    /// `{address}` is replaced with the pool address
    pub bin_path_templates: Vec<String>,
    /// Query parameter spellings for the cluster filter
    pub network_params: Vec<String>,
    pub listing_paths: Vec<String>,
    pub pool_subresource_paths: Vec<String>,
    pub sample_pool_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            default_pool: "BGm1tav58oGcsQJehL9WXBFXF7D27vZsKefj4xJKD5Y".to_string(),
            default_network: Network::Devnet,
            default_radius: 20,
            request_timeout_ms: 4_000,
            price_timeout_ms: 2_000,
            fallback_price: 100.0,
            synthetic_bin_step_percent: 1.0,
            dlmm_program_id: DLMM_PROGRAM_ID.to_string(),
            rpc: NetworkEndpoints {
                devnet: "https://api.devnet.solana.com".to_string(),
                testnet: "https://api.testnet.solana.com".to_string(),
                mainnet: "https://api.mainnet-beta.solana.com".to_string(),
                localhost: "http://127.0.0.1:8899".to_string(),
            },
            indexer: NetworkEndpoints {
                devnet: "https://devnet-dlmm-api.meteora.ag".to_string(),
                testnet: "https://devnet-dlmm-api.meteora.ag".to_string(),
                mainnet: "https://dlmm-api.meteora.ag".to_string(),
                localhost: "http://127.0.0.1:3000".to_string(),
            },
            jupiter_price_url: "https://price.jup.ag/v6/price?ids=SOL&vsToken=USDC".to_string(),
            coingecko_price_url:
                "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd"
                    .to_string(),
            strategies: vec![
                StrategyKind::OnChain,
                StrategyKind::IndexerPaths,
                StrategyKind::ListThenMatch,
                StrategyKind::SyntheticFromDetail,
                StrategyKind::FallbackDemo,
            ],
            bin_path_templates: vec![
                "/pools/{address}/bins".to_string(),
                "/pair/{address}/bins".to_string(),
                "/pair/{address}".to_string(),
                "/bins?pool={address}".to_string(),
                "/bins?pair={address}".to_string(),
            ],
            network_params: vec!["network".to_string(), "cluster".to_string()],
            listing_paths: vec!["/pair/all".to_string(), "/pools".to_string()],
            pool_subresource_paths: vec![
                "/pair/{address}/bins".to_string(),
                "/pair/{address}".to_string(),
            ],
            sample_pool_limit: 10,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `.env`, an optional config file and the environment
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config: ServiceConfig = config::Config::builder()
            .add_source(config::Config::try_from(&ServiceConfig::default())?)
            .add_source(config::File::with_name("dlmm-bins").required(false))
            .add_source(
                config::Environment::with_prefix("DLMM_BINS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("strategies")
                    .with_list_parse_key("bin_path_templates")
                    .with_list_parse_key("network_params")
                    .with_list_parse_key("listing_paths")
                    .with_list_parse_key("pool_subresource_paths"),
            )
            .build()?
            .try_deserialize()?;

        // Honor the conventional PORT variable
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Basic sanity checks
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.request_timeout_ms == 0 || self.price_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Timeouts must be greater than zero"));
        }
        if !(self.fallback_price.is_finite() && self.fallback_price > 0.0) {
            return Err(anyhow::anyhow!("fallback_price must be a positive number"));
        }
        if self.network_params.is_empty() {
            return Err(anyhow::anyhow!("network_params cannot be empty"));
        }
        if self.dlmm_program_id.is_empty() {
            return Err(anyhow::anyhow!("dlmm_program_id cannot be empty"));
        }
        Ok(())
    }
}
