//! Shared mocks for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dlmm_bins::config::NetworkEndpoints;
use dlmm_bins::sources::onchain::{PoolHandle, PoolQuery};
use dlmm_bins::sources::price::SpotPriceSource;
use dlmm_bins::{
    AppState, BinResolver, BinsError, IndexerClient, Network, RawBin, ServiceConfig, SpotPrice,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const POOL: &str = "5rCf1DM8LjKTw4YqhnoLcngyZYeNnQqztScTogYHAS6";

/// Spot price that never touches the network
pub struct FixedSpotPrice(pub f64);

#[async_trait]
impl SpotPriceSource for FixedSpotPrice {
    async fn quote(&self) -> SpotPrice {
        SpotPrice {
            price: self.0,
            source: "fixed".to_string(),
        }
    }
}

/// Counts every call per operation
#[derive(Default)]
pub struct CallCounts {
    pub create: AtomicUsize,
    pub active_bin: AtomicUsize,
    pub around: AtomicUsize,
    pub all: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.create.load(Ordering::SeqCst)
            + self.active_bin.load(Ordering::SeqCst)
            + self.around.load(Ordering::SeqCst)
            + self.all.load(Ordering::SeqCst)
    }
}

/// In-memory pool query with scripted results
pub struct MockPoolQuery {
    pub window: Vec<RawBin>,
    pub all: Vec<RawBin>,
    pub fail_create: bool,
    pub active_id: i32,
    pub bin_step: u16,
    pub calls: Arc<CallCounts>,
}

impl MockPoolQuery {
    /// Every call fails as if the RPC node were unreachable
    pub fn unreachable() -> Self {
        Self {
            window: Vec::new(),
            all: Vec::new(),
            fail_create: true,
            active_id: 0,
            bin_step: 0,
            calls: Arc::new(CallCounts::default()),
        }
    }

    pub fn with_window(bins: Vec<RawBin>) -> Self {
        Self {
            window: bins,
            fail_create: false,
            ..Self::unreachable()
        }
    }

    pub fn with_all(mut self, bins: Vec<RawBin>) -> Self {
        self.all = bins;
        self
    }

    pub fn with_active(mut self, active_id: i32, bin_step: u16) -> Self {
        self.active_id = active_id;
        self.bin_step = bin_step;
        self
    }

    pub fn counts(&self) -> Arc<CallCounts> {
        self.calls.clone()
    }
}

#[async_trait]
impl PoolQuery for MockPoolQuery {
    async fn create(&self, address: &str, network: Network) -> dlmm_bins::Result<PoolHandle> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(BinsError::Rpc("connection refused".to_string()));
        }
        Ok(PoolHandle::new(address, network, self.active_id, self.bin_step, 1.0))
    }

    async fn active_bin(&self, handle: &PoolHandle) -> dlmm_bins::Result<i32> {
        self.calls.active_bin.fetch_add(1, Ordering::SeqCst);
        Ok(handle.active_id)
    }

    async fn bins_around_active(
        &self,
        _handle: &PoolHandle,
        _active_id: i32,
        _radius: u32,
    ) -> dlmm_bins::Result<Vec<RawBin>> {
        self.calls.around.fetch_add(1, Ordering::SeqCst);
        Ok(self.window.clone())
    }

    async fn all_bins(&self, _handle: &PoolHandle) -> dlmm_bins::Result<Vec<RawBin>> {
        self.calls.all.fetch_add(1, Ordering::SeqCst);
        Ok(self.all.clone())
    }
}

/// `count` bins with descending prices, so sorting is observable
pub fn raw_bins(count: usize) -> Vec<RawBin> {
    (0..count)
        .map(|i| RawBin {
            bin_id: i as i32,
            price_per_lamport: 200.0 - i as f64,
            amount_x: 10 * i as u64,
            amount_y: 5,
        })
        .collect()
}

/// Default config pointed at a mock upstream
pub fn test_config(upstream: &str) -> ServiceConfig {
    ServiceConfig {
        indexer: NetworkEndpoints::uniform(upstream),
        rpc: NetworkEndpoints::uniform(upstream),
        jupiter_price_url: format!("{}/price/jupiter", upstream),
        coingecko_price_url: format!("{}/price/coingecko", upstream),
        request_timeout_ms: 500,
        price_timeout_ms: 500,
        ..ServiceConfig::default()
    }
}

pub fn resolver(config: ServiceConfig, pools: MockPoolQuery) -> BinResolver {
    let indexer = IndexerClient::new(
        config.indexer.clone(),
        Duration::from_millis(config.request_timeout_ms),
    )
    .unwrap();
    BinResolver::new(
        Arc::new(config),
        Arc::new(pools),
        indexer,
        Arc::new(FixedSpotPrice(100.0)),
    )
}

pub fn app_state(config: ServiceConfig, pools: MockPoolQuery) -> AppState {
    AppState::with_sources(config, Arc::new(pools), Arc::new(FixedSpotPrice(100.0))).unwrap()
}
