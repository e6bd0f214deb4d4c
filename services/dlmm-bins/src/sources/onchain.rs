//! On-chain pool queries against the DLMM program over Solana JSON-RPC

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::NetworkEndpoints;
use crate::types::*;

/// Bins per on-chain bin array account
pub const BINS_PER_ARRAY: i64 = 70;
/// Serialized size of a bin array account
pub const BIN_ARRAY_SIZE: usize = 10_136;
/// Offset of the owning pair pubkey inside a bin array
pub const BIN_ARRAY_LB_PAIR_OFFSET: usize = 24;

const BIN_ARRAY_INDEX_OFFSET: usize = 8;
const BIN_ARRAY_BINS_OFFSET: usize = 56;
const BIN_SIZE: usize = 144;

const LB_PAIR_ACTIVE_ID_OFFSET: usize = 76;
const LB_PAIR_BIN_STEP_OFFSET: usize = 80;
const LB_PAIR_TOKEN_X_MINT_OFFSET: usize = 88;
const LB_PAIR_TOKEN_Y_MINT_OFFSET: usize = 120;
const LB_PAIR_MIN_SIZE: usize = 152;

const MINT_DECIMALS_OFFSET: usize = 44;

/// Handle to a pool resolved on a specific network. Lives for one
/// resolution; bin arrays read through it are fetched at most once.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    pub address: String,
    pub network: Network,
    pub active_id: i32,
    /// Basis points
    pub bin_step: u16,
    /// Converts per-lamport prices into per-token prices
    pub price_scale: f64,
    bin_arrays: Arc<OnceCell<Vec<RawBin>>>,
}

impl PoolHandle {
    pub fn new(
        address: impl Into<String>,
        network: Network,
        active_id: i32,
        bin_step: u16,
        price_scale: f64,
    ) -> Self {
        Self {
            address: address.into(),
            network,
            active_id,
            bin_step,
            price_scale,
            bin_arrays: Arc::new(OnceCell::new()),
        }
    }

    /// Per-token price of a bin id: `(1 + bin_step/10000)^id`, decimal adjusted
    pub fn price_of(&self, bin_id: i32) -> f64 {
        (1.0 + self.bin_step as f64 / 10_000.0).powi(bin_id) * self.price_scale
    }

    /// Price and bin step of the active bin
    pub fn detail(&self) -> Option<PoolDetail> {
        let price = self.price_of(self.active_id);
        (price.is_finite() && price > 0.0 && self.bin_step > 0).then_some(PoolDetail {
            price,
            bin_step: self.bin_step as f64,
        })
    }
}

/// On-chain pool query capability
#[async_trait]
pub trait PoolQuery: Send + Sync {
    /// Create a handle for the pool at `address`
    async fn create(&self, address: &str, network: Network) -> Result<PoolHandle>;

    /// Id of the bin holding the current price
    async fn active_bin(&self, handle: &PoolHandle) -> Result<i32>;

    /// Bins within `radius` ids of `active_id`
    async fn bins_around_active(
        &self,
        handle: &PoolHandle,
        active_id: i32,
        radius: u32,
    ) -> Result<Vec<RawBin>>;

    /// Every initialized bin of the pool
    async fn all_bins(&self, handle: &PoolHandle) -> Result<Vec<RawBin>>;
}

/// JSON-RPC backed [`PoolQuery`]
#[derive(Clone)]
pub struct RpcPoolQuery {
    client: Client,
    endpoints: NetworkEndpoints,
    program_id: String,
    timeout: Duration,
}

impl RpcPoolQuery {
    pub fn new(
        endpoints: NetworkEndpoints,
        program_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BinsError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoints,
            program_id: program_id.into(),
            timeout,
        })
    }

    async fn call(&self, network: Network, method: &str, params: Value) -> Result<Value> {
        let url = self.endpoints.for_network(network);
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!("RPC {} -> {}", method, url);

        let request = self.client.post(url).json(&body).send();
        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(BinsError::Http(e.to_string())),
            Err(_) => {
                return Err(BinsError::Timeout {
                    url: url.to_string(),
                    millis: self.timeout.as_millis() as u64,
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(BinsError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut reply: Value = response
            .json()
            .await
            .map_err(|e| BinsError::InvalidResponse(e.to_string()))?;

        if let Some(err) = reply.get("error") {
            return Err(BinsError::Rpc(err.to_string()));
        }

        Ok(reply
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn account_data(&self, network: Network, address: &str) -> Result<Vec<u8>> {
        let result = self
            .call(network, "getAccountInfo", json!([address, {"encoding": "base64"}]))
            .await?;

        match result.get("value") {
            Some(account) if !account.is_null() => decode_account_data(account),
            _ => Err(BinsError::AccountNotFound(address.to_string())),
        }
    }

    /// Token decimals of both mints; missing accounts leave the scale at 1
    async fn price_scale(&self, network: Network, mint_x: &str, mint_y: &str) -> f64 {
        let result = self
            .call(
                network,
                "getMultipleAccounts",
                json!([[mint_x, mint_y], {"encoding": "base64"}]),
            )
            .await;

        let accounts = match result {
            Ok(r) => r.get("value").and_then(Value::as_array).cloned().unwrap_or_default(),
            Err(e) => {
                warn!("Mint lookup failed, using unscaled prices: {}", e);
                return 1.0;
            }
        };

        let decimals: Vec<Option<u8>> = accounts
            .iter()
            .map(|a| {
                decode_account_data(a)
                    .ok()
                    .and_then(|d| d.get(MINT_DECIMALS_OFFSET).copied())
            })
            .collect();

        match decimals.as_slice() {
            [Some(x), Some(y)] => 10f64.powi(*x as i32 - *y as i32),
            _ => 1.0,
        }
    }

    /// Liquid bins of every bin array owned by the pair, fetched once per handle
    async fn bin_arrays(&self, handle: &PoolHandle) -> Result<Vec<RawBin>> {
        handle
            .bin_arrays
            .get_or_try_init(|| self.fetch_bin_arrays(handle))
            .await
            .cloned()
    }

    async fn fetch_bin_arrays(&self, handle: &PoolHandle) -> Result<Vec<RawBin>> {
        let owner = json!({"offset": BIN_ARRAY_LB_PAIR_OFFSET, "bytes": handle.address});
        let result = self
            .call(
                handle.network,
                "getProgramAccounts",
                json!([
                    self.program_id,
                    {
                        "encoding": "base64",
                        "filters": [
                            {"dataSize": BIN_ARRAY_SIZE},
                            {"memcmp": owner}
                        ]
                    }
                ]),
            )
            .await?;

        let accounts = result.as_array().ok_or_else(|| {
            BinsError::InvalidResponse("getProgramAccounts result is not an array".to_string())
        })?;

        let mut bins = Vec::new();
        for entry in accounts {
            let Some(account) = entry.get("account") else { continue };
            match decode_account_data(account).and_then(|d| decode_bin_array(&d)) {
                Ok(mut decoded) => bins.append(&mut decoded),
                Err(e) => debug!("Skipping undecodable bin array: {}", e),
            }
        }

        bins.retain(|b| b.amount_x > 0 || b.amount_y > 0);
        bins.sort_by_key(|b| b.bin_id);
        Ok(bins)
    }
}

#[async_trait]
impl PoolQuery for RpcPoolQuery {
    async fn create(&self, address: &str, network: Network) -> Result<PoolHandle> {
        let data = self.account_data(network, address).await?;
        let pair = decode_lb_pair(&data)?;
        let price_scale = self.price_scale(network, &pair.token_x_mint, &pair.token_y_mint).await;

        Ok(PoolHandle::new(
            address,
            network,
            pair.active_id,
            pair.bin_step,
            price_scale,
        ))
    }

    async fn active_bin(&self, handle: &PoolHandle) -> Result<i32> {
        Ok(handle.active_id)
    }

    async fn bins_around_active(
        &self,
        handle: &PoolHandle,
        active_id: i32,
        radius: u32,
    ) -> Result<Vec<RawBin>> {
        let low = active_id.saturating_sub(radius as i32);
        let high = active_id.saturating_add(radius as i32);
        let mut bins = self.bin_arrays(handle).await?;
        bins.retain(|b| (low..=high).contains(&b.bin_id));
        Ok(bins)
    }

    async fn all_bins(&self, handle: &PoolHandle) -> Result<Vec<RawBin>> {
        self.bin_arrays(handle).await
    }
}

/// Fields of the pair account this service reads
#[derive(Debug, Clone, PartialEq)]
pub struct LbPairState {
    pub active_id: i32,
    pub bin_step: u16,
    pub token_x_mint: String,
    pub token_y_mint: String,
}

fn decode_account_data(account: &Value) -> Result<Vec<u8>> {
    let encoded = account
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(Value::as_str)
        .ok_or_else(|| BinsError::InvalidResponse("account data missing".to_string()))?;

    STANDARD
        .decode(encoded)
        .map_err(|e| BinsError::InvalidResponse(format!("bad base64 account data: {}", e)))
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| {
            BinsError::InvalidResponse(format!("account too short for read at {}", offset))
        })
}

/// Decode the pair account (8-byte discriminator included)
pub fn decode_lb_pair(data: &[u8]) -> Result<LbPairState> {
    if data.len() < LB_PAIR_MIN_SIZE {
        return Err(BinsError::InvalidResponse(format!(
            "pair account is {} bytes, expected at least {}",
            data.len(),
            LB_PAIR_MIN_SIZE
        )));
    }

    let mint_at = |offset: usize| {
        read_array::<32>(data, offset).map(|key| bs58::encode(key).into_string())
    };

    Ok(LbPairState {
        active_id: i32::from_le_bytes(read_array(data, LB_PAIR_ACTIVE_ID_OFFSET)?),
        bin_step: u16::from_le_bytes(read_array(data, LB_PAIR_BIN_STEP_OFFSET)?),
        token_x_mint: mint_at(LB_PAIR_TOKEN_X_MINT_OFFSET)?,
        token_y_mint: mint_at(LB_PAIR_TOKEN_Y_MINT_OFFSET)?,
    })
}

/// Decode every bin of a bin array account. Prices are Q64.64 per lamport.
pub fn decode_bin_array(data: &[u8]) -> Result<Vec<RawBin>> {
    if data.len() < BIN_ARRAY_SIZE {
        return Err(BinsError::InvalidResponse(format!(
            "bin array is {} bytes, expected {}",
            data.len(),
            BIN_ARRAY_SIZE
        )));
    }

    let index = i64::from_le_bytes(read_array(data, BIN_ARRAY_INDEX_OFFSET)?);
    let mut bins = Vec::with_capacity(BINS_PER_ARRAY as usize);

    for slot in 0..BINS_PER_ARRAY as usize {
        let at = BIN_ARRAY_BINS_OFFSET + slot * BIN_SIZE;
        let amount_x = u64::from_le_bytes(read_array(data, at)?);
        let amount_y = u64::from_le_bytes(read_array(data, at + 8)?);
        let price_q64 = u128::from_le_bytes(read_array(data, at + 16)?);

        let bin_id = index * BINS_PER_ARRAY + slot as i64;
        let Ok(bin_id) = i32::try_from(bin_id) else { continue };

        bins.push(RawBin {
            bin_id,
            price_per_lamport: price_q64 as f64 / 2f64.powi(64),
            amount_x,
            amount_y,
        });
    }

    Ok(bins)
}
