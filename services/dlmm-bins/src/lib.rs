pub mod types;
pub mod config;
pub mod sources {
    pub mod indexer;
    pub mod onchain;
    pub mod price;
}
pub mod normalizers;
pub mod synthetic;
pub mod resolver;
pub mod handlers;

pub use types::*;
pub use config::{ServiceConfig, StrategyKind};
pub use resolver::{BinRequest, BinResolver};
pub use sources::indexer::IndexerClient;
pub use sources::onchain::{PoolQuery, RpcPoolQuery};
pub use sources::price::{SpotPriceClient, SpotPriceSource};

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers. Holds only immutable
/// configuration and client handles; nothing is mutated per request.
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub resolver: BinResolver,
    pub indexer: IndexerClient,
    pub spot: Arc<dyn SpotPriceSource>,
}

impl AppState {
    /// Wire real upstream clients from configuration
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);

        let pools: Arc<dyn PoolQuery> = Arc::new(RpcPoolQuery::new(
            config.rpc.clone(),
            config.dlmm_program_id.clone(),
            request_timeout,
        )?);
        let spot: Arc<dyn SpotPriceSource> = Arc::new(SpotPriceClient::new(
            config.jupiter_price_url.clone(),
            config.coingecko_price_url.clone(),
            config.fallback_price,
            Duration::from_millis(config.price_timeout_ms),
        )?);

        Self::with_sources(config, pools, spot)
    }

    /// Wire with caller-supplied on-chain and price capabilities
    pub fn with_sources(
        config: ServiceConfig,
        pools: Arc<dyn PoolQuery>,
        spot: Arc<dyn SpotPriceSource>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let indexer = IndexerClient::new(
            config.indexer.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )?;
        let resolver = BinResolver::new(config.clone(), pools, indexer.clone(), spot.clone());

        Ok(Self {
            config,
            resolver,
            indexer,
            spot,
        })
    }
}

/// Build the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/bins", get(handlers::get_bins))
        .route("/price", get(handlers::get_price))
        .route("/sample-pools", get(handlers::get_sample_pools))
        .route("/health", get(handlers::health_check))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
