use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discretized price level and the liquidity resting there
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinPoint {
    pub price: f64,
    pub liquidity: f64,
}

impl BinPoint {
    /// Build a bin, rejecting non-positive or non-finite prices.
    /// Liquidity is clamped to zero; non-finite liquidity is rejected.
    pub fn new(price: f64, liquidity: f64) -> Option<Self> {
        if !price.is_finite() || price <= 0.0 || !liquidity.is_finite() {
            return None;
        }
        Some(Self {
            price,
            liquidity: liquidity.max(0.0),
        })
    }
}

/// Sort bins ascending by price
pub fn sort_bins(bins: &mut [BinPoint]) {
    bins.sort_by(|a, b| a.price.total_cmp(&b.price));
}

/// Target cluster for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Devnet,
    Testnet,
    Mainnet,
    Localhost,
}

static NETWORK_ALIASES: phf::Map<&'static str, Network> = phf::phf_map! {
    "dev" => Network::Devnet,
    "devnet" => Network::Devnet,
    "test" => Network::Testnet,
    "testnet" => Network::Testnet,
    "main" => Network::Mainnet,
    "mainnet" => Network::Mainnet,
    "mainnet-beta" => Network::Mainnet,
    "local" => Network::Localhost,
    "localnet" => Network::Localhost,
    "localhost" => Network::Localhost,
};

impl Network {
    /// Resolve a user-supplied network name, case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        NETWORK_ALIASES
            .get(raw.trim().to_ascii_lowercase().as_str())
            .copied()
    }

    /// Cluster name sent to upstream providers. RPC and REST lookups for a
    /// request both derive from this value.
    pub fn cluster(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet-beta",
            Network::Localhost => "localnet",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Localhost => "localhost",
        }
    }
}

/// Which strategy produced the bins of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionSource {
    UpstreamSdk,
    UpstreamIndexer,
    UpstreamRest,
    SyntheticFromRest,
    FallbackDemo,
}

impl ResolutionSource {
    /// Real upstream data, as opposed to generated bins
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ResolutionSource::UpstreamSdk
                | ResolutionSource::UpstreamIndexer
                | ResolutionSource::UpstreamRest
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::UpstreamSdk => "upstream-sdk",
            ResolutionSource::UpstreamIndexer => "upstream-indexer",
            ResolutionSource::UpstreamRest => "upstream-rest",
            ResolutionSource::SyntheticFromRest => "synthetic-from-rest",
            ResolutionSource::FallbackDemo => "fallback-demo",
        }
    }
}

/// Response body of the bins endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionOutcome {
    pub source: ResolutionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub pool: String,
    pub network: Network,
    pub bins: Vec<BinPoint>,
    pub bins_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl ResolutionOutcome {
    pub fn new(
        source: ResolutionSource,
        reason: Option<String>,
        pool: impl Into<String>,
        network: Network,
        mut bins: Vec<BinPoint>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        sort_bins(&mut bins);
        Self {
            source,
            reason,
            pool: pool.into(),
            network,
            bins_count: bins.len(),
            bins,
            updated_at,
        }
    }
}

/// Price and bin step discovered for a pool that exposed no enumerable bins
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDetail {
    pub price: f64,
    /// Basis points between adjacent bins
    pub bin_step: f64,
}

/// Bin decoded from an on-chain bin array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBin {
    pub bin_id: i32,
    pub price_per_lamport: f64,
    pub amount_x: u64,
    pub amount_y: u64,
}

impl RawBin {
    /// Same liquidity rule as the paired-amount path of the normalizer
    pub fn to_point(&self, price_scale: f64) -> Option<BinPoint> {
        BinPoint::new(
            self.price_per_lamport * price_scale,
            self.amount_x as f64 + self.amount_y as f64,
        )
    }
}

/// SOL/USDC reference price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPrice {
    pub price: f64,
    pub source: String,
}

/// Pool entry for the picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePool {
    pub address: String,
    pub label: String,
}

/// Error types for bin resolution
#[derive(Debug, thiserror::Error)]
pub enum BinsError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} timed out after {millis}ms")]
    Timeout { url: String, millis: u64 },

    #[error("invalid response format: {0}")]
    InvalidResponse(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("pool {0} not present in indexer listing")]
    PoolNotListed(String),

    #[error("no pool detail discovered")]
    NoDetail,
}

/// Result type for bin resolution operations
pub type Result<T> = std::result::Result<T, BinsError>;
