use axum::{
    extract::{RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::resolver::BinRequest;
use crate::types::{Network, SamplePool};
use crate::AppState;

pub const MIN_RADIUS: u32 = 5;
pub const MAX_RADIUS: u32 = 120;

const UPSTREAM_CACHE_CONTROL: &str = "public, max-age=15";
const NO_STORE: &str = "no-store";

/// Query params for the bins endpoint. Everything is optional and parsed
/// leniently so a malformed value never turns into a rejection.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BinsQuery {
    pub pool: Option<String>,
    pub network: Option<String>,
    pub radius: Option<String>,
}

/// First value of `name` in a raw query string. Repeated keys are ignored.
pub fn first_param(raw: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Base58 alphabet and a 30-60 character window. A shape filter only.
pub fn is_pool_address(candidate: &str) -> bool {
    let len = candidate.chars().count();
    (30..=60).contains(&len) && bs58::decode(candidate).into_vec().is_ok()
}

/// Network from a user-supplied name, else `default`
pub fn parse_network(raw: Option<&str>, default: Network) -> Network {
    raw.and_then(Network::parse).unwrap_or(default)
}

/// Radius clamped to [`MIN_RADIUS`, `MAX_RADIUS`]
pub fn parse_radius(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|r| r.trim().parse::<i64>().ok())
        .map(|r| r.clamp(MIN_RADIUS as i64, MAX_RADIUS as i64) as u32)
        .unwrap_or_else(|| default.clamp(MIN_RADIUS, MAX_RADIUS))
}

impl BinsQuery {
    pub fn from_raw(raw: Option<&str>) -> Self {
        Self {
            pool: first_param(raw, "pool"),
            network: first_param(raw, "network"),
            radius: first_param(raw, "radius"),
        }
    }

    /// Validated request plus, when the pool was rejected, the reason
    pub fn into_request(
        self,
        default_pool: &str,
        default_network: Network,
        default_radius: u32,
    ) -> (BinRequest, Option<String>) {
        let network = parse_network(self.network.as_deref(), default_network);
        let radius = parse_radius(self.radius.as_deref(), default_radius);

        let requested = self.pool.as_deref().map(str::trim).unwrap_or_default();
        let (pool, invalid) = if requested.is_empty() {
            (default_pool.to_string(), None)
        } else if is_pool_address(requested) {
            (requested.to_string(), None)
        } else {
            (
                default_pool.to_string(),
                Some(format!("invalid pool address '{}'; using default pool", requested)),
            )
        };

        (BinRequest { pool, network, radius }, invalid)
    }
}

/// GET /bins - Liquidity bins for a pool. Always 200; degraded data is
/// flagged through `source` and `reason`.
pub async fn get_bins(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Response {
    let config = &state.config;
    let (request, invalid) = BinsQuery::from_raw(raw.as_deref()).into_request(
        &config.default_pool,
        config.default_network,
        config.default_radius,
    );

    info!(
        "Resolving bins for {} on {} (radius {})",
        request.pool,
        request.network.as_str(),
        request.radius
    );

    let outcome = match invalid {
        Some(reason) => {
            warn!("{}", reason);
            state.resolver.fallback_demo(&request, reason, Utc::now()).await
        }
        None => state.resolver.resolve(&request).await,
    };

    let cache_control = if outcome.source.is_upstream() {
        UPSTREAM_CACHE_CONTROL
    } else {
        NO_STORE
    };

    ([(header::CACHE_CONTROL, cache_control)], Json(outcome)).into_response()
}

/// GET /price - SOL/USDC reference price
pub async fn get_price(State(state): State<Arc<AppState>>) -> Response {
    let quote = state.spot.quote().await;
    ([(header::CACHE_CONTROL, NO_STORE)], Json(quote)).into_response()
}

/// GET /sample-pools - Pools for the picker
pub async fn get_sample_pools(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Response {
    let config = &state.config;
    let requested = first_param(raw.as_deref(), "network");
    let network = parse_network(requested.as_deref(), config.default_network);

    match state
        .indexer
        .sample_pools(network, &config.listing_paths, config.sample_pool_limit)
        .await
    {
        Ok(pools) => {
            let body = SamplePoolsResponse {
                count: pools.len(),
                pools,
                source: Some(format!("indexer-{}", network.as_str())),
                reason: None,
            };
            (
                [(header::CACHE_CONTROL, "max-age=0, s-maxage=60")],
                Json(body),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Sample pool listing failed for {}: {}", network.as_str(), e);
            let body = SamplePoolsResponse {
                pools: Vec::new(),
                count: 0,
                source: None,
                reason: Some(e.to_string()),
            };
            ([(header::CACHE_CONTROL, NO_STORE)], Json(body)).into_response()
        }
    }
}

/// GET /health - Liveness
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        default_network: state.config.default_network,
        strategies: state.config.strategies.iter().map(|s| s.as_str()).collect(),
    })
}

// Response types
#[derive(Debug, serde::Serialize)]
pub struct SamplePoolsResponse {
    pub pools: Vec<SamplePool>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub default_network: Network,
    pub strategies: Vec<&'static str>,
}
