//! Source resolution waterfall
//!
//! Strategies are tried one at a time in configured order. The first one
//! that yields at least one bin wins; any failure only moves resolution on
//! to the next strategy. Fallback-demo always succeeds and is run even when
//! the configured order leaves it out.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ServiceConfig, StrategyKind};
use crate::normalizers::{extract_bins, extract_detail, record_address};
use crate::sources::indexer::IndexerClient;
use crate::sources::onchain::PoolQuery;
use crate::sources::price::SpotPriceSource;
use crate::synthetic::{generate_bins, SyntheticConfig};
use crate::types::*;

/// Step bounds (percent) for bins synthesized from a pool detail
const MIN_DETAIL_STEP_PERCENT: f64 = 0.01;
const MAX_DETAIL_STEP_PERCENT: f64 = 5.0;

/// Pair account read plus mint decimals lookup
const CREATE_ROUND_TRIPS: u64 = 2;

/// Validated input of one resolution
#[derive(Debug, Clone, PartialEq)]
pub struct BinRequest {
    pub pool: String,
    pub network: Network,
    pub radius: u32,
}

/// Per-request scratch state shared between strategies
#[derive(Debug, Default)]
struct AttemptContext {
    detail: Option<PoolDetail>,
    failures: Vec<String>,
}

impl AttemptContext {
    fn fail(&mut self, strategy: StrategyKind, reason: impl std::fmt::Display) {
        debug!("Strategy {} failed: {}", strategy.as_str(), reason);
        self.failures.push(format!("{}: {}", strategy.as_str(), reason));
    }

    /// Every failure so far, in attempt order
    fn reason(&self) -> Option<String> {
        (!self.failures.is_empty()).then(|| self.failures.join("; "))
    }

    fn observe(&mut self, body: &serde_json::Value) {
        if self.detail.is_none() {
            self.detail = extract_detail(body);
        }
    }
}

impl StrategyKind {
    fn source(&self) -> ResolutionSource {
        match self {
            StrategyKind::OnChain => ResolutionSource::UpstreamSdk,
            StrategyKind::IndexerPaths => ResolutionSource::UpstreamRest,
            StrategyKind::ListThenMatch => ResolutionSource::UpstreamIndexer,
            StrategyKind::SyntheticFromDetail => ResolutionSource::SyntheticFromRest,
            StrategyKind::FallbackDemo => ResolutionSource::FallbackDemo,
        }
    }
}

/// Drives the strategy waterfall for one request at a time
#[derive(Clone)]
pub struct BinResolver {
    config: Arc<ServiceConfig>,
    pools: Arc<dyn PoolQuery>,
    indexer: IndexerClient,
    spot: Arc<dyn SpotPriceSource>,
}

impl BinResolver {
    pub fn new(
        config: Arc<ServiceConfig>,
        pools: Arc<dyn PoolQuery>,
        indexer: IndexerClient,
        spot: Arc<dyn SpotPriceSource>,
    ) -> Self {
        Self {
            config,
            pools,
            indexer,
            spot,
        }
    }

    pub async fn resolve(&self, request: &BinRequest) -> ResolutionOutcome {
        self.resolve_at(request, Utc::now()).await
    }

    /// Resolve bins for `request`, stamping the outcome with `now`
    pub async fn resolve_at(&self, request: &BinRequest, now: DateTime<Utc>) -> ResolutionOutcome {
        let mut ctx = AttemptContext::default();

        for strategy in &self.config.strategies {
            let attempt = match strategy {
                StrategyKind::OnChain => self.on_chain(request, &mut ctx).await,
                StrategyKind::IndexerPaths => self.indexer_paths(request, &mut ctx).await,
                StrategyKind::ListThenMatch => self.list_then_match(request, &mut ctx).await,
                StrategyKind::SyntheticFromDetail => self.synthetic_from_detail(request, &ctx),
                StrategyKind::FallbackDemo => break,
            };

            match attempt {
                Ok(bins) if !bins.is_empty() => {
                    info!(
                        pool = %request.pool,
                        network = request.network.as_str(),
                        strategy = strategy.as_str(),
                        bins = bins.len(),
                        "Resolved bins"
                    );
                    return ResolutionOutcome::new(
                        strategy.source(),
                        ctx.reason(),
                        request.pool.clone(),
                        request.network,
                        bins,
                        now,
                    );
                }
                Ok(_) => ctx.fail(*strategy, "no bins"),
                Err(e) => ctx.fail(*strategy, e),
            }
        }

        let reason = ctx
            .reason()
            .unwrap_or_else(|| "no upstream strategy produced bins".to_string());
        self.fallback_demo(request, reason, now).await
    }

    /// Demo distribution around the spot price. Cannot fail.
    pub async fn fallback_demo(
        &self,
        request: &BinRequest,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> ResolutionOutcome {
        let center = self.spot.quote().await.price;
        let bins = generate_bins(
            center,
            &SyntheticConfig::for_radius(self.config.synthetic_bin_step_percent, request.radius),
        );

        info!(
            pool = %request.pool,
            center,
            "Serving fallback demo bins"
        );

        ResolutionOutcome::new(
            ResolutionSource::FallbackDemo,
            Some(reason.into()),
            request.pool.clone(),
            request.network,
            bins,
            now,
        )
    }

    /// Bound one outbound call by the configured timeout
    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        self.bounded_for(what, 1, fut).await
    }

    /// Bound an operation spanning `round_trips` outbound calls
    async fn bounded_for<T>(
        &self,
        what: &str,
        round_trips: u64,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let millis = self.config.request_timeout_ms.saturating_mul(round_trips);
        match tokio::time::timeout(Duration::from_millis(millis), fut).await {
            Ok(result) => result,
            Err(_) => Err(BinsError::Timeout {
                url: what.to_string(),
                millis,
            }),
        }
    }

    async fn on_chain(
        &self,
        request: &BinRequest,
        ctx: &mut AttemptContext,
    ) -> Result<Vec<BinPoint>> {
        let handle = self
            .bounded_for(
                "rpc:create",
                CREATE_ROUND_TRIPS,
                self.pools.create(&request.pool, request.network),
            )
            .await?;
        let active_id = self.bounded("rpc:active_bin", self.pools.active_bin(&handle)).await?;

        let mut raw = self
            .bounded(
                "rpc:bins_around_active",
                self.pools.bins_around_active(&handle, active_id, request.radius),
            )
            .await?;
        if raw.is_empty() {
            raw = self.bounded("rpc:all_bins", self.pools.all_bins(&handle)).await?;
        }

        let bins: Vec<BinPoint> = raw
            .iter()
            .filter_map(|b| b.to_point(handle.price_scale))
            .collect();

        if bins.is_empty() && ctx.detail.is_none() {
            ctx.detail = handle.detail();
        }
        Ok(bins)
    }

    async fn indexer_paths(
        &self,
        request: &BinRequest,
        ctx: &mut AttemptContext,
    ) -> Result<Vec<BinPoint>> {
        let mut last_error = None;

        for template in &self.config.bin_path_templates {
            for param in &self.config.network_params {
                let url = self
                    .indexer
                    .url_for(request.network, template, &request.pool, Some(param.as_str()))?;

                match self.indexer.get_json(url.clone()).await {
                    Ok(body) => {
                        let bins = extract_bins(&body);
                        if !bins.is_empty() {
                            debug!("Indexer path {} yielded {} bins", url, bins.len());
                            return Ok(bins);
                        }
                        ctx.observe(&body);
                    }
                    Err(e) => {
                        debug!("Indexer path {} failed: {}", url, e);
                        last_error = Some(e);
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    async fn list_then_match(
        &self,
        request: &BinRequest,
        ctx: &mut AttemptContext,
    ) -> Result<Vec<BinPoint>> {
        let records = self
            .indexer
            .list_pools(request.network, &self.config.listing_paths)
            .await?;

        let entry = IndexerClient::find_pool(&records, &request.pool)
            .ok_or_else(|| BinsError::PoolNotListed(request.pool.clone()))?;

        let bins = extract_bins(entry);
        if !bins.is_empty() {
            return Ok(bins);
        }
        ctx.observe(entry);

        let address = record_address(entry).unwrap_or(request.pool.as_str());
        let mut last_error = None;

        for template in &self.config.pool_subresource_paths {
            let url = self.indexer.url_for(request.network, template, address, None)?;
            match self.indexer.get_json(url).await {
                Ok(body) => {
                    let bins = extract_bins(&body);
                    if !bins.is_empty() {
                        return Ok(bins);
                    }
                    ctx.observe(&body);
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    fn synthetic_from_detail(
        &self,
        request: &BinRequest,
        ctx: &AttemptContext,
    ) -> Result<Vec<BinPoint>> {
        let detail = ctx.detail.ok_or(BinsError::NoDetail)?;
        let step_percent =
            (detail.bin_step / 100.0).clamp(MIN_DETAIL_STEP_PERCENT, MAX_DETAIL_STEP_PERCENT);

        Ok(generate_bins(
            detail.price,
            &SyntheticConfig::for_radius(step_percent, request.radius),
        ))
    }
}
