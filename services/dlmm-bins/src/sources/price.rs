use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::sources::indexer::fetch_json;
use crate::types::*;

/// Reference SOL/USDC price used to center synthetic bins
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    /// Never fails; degrades to a constant placeholder
    async fn quote(&self) -> SpotPrice;
}

/// One price provider: where to fetch, and where the price sits in the reply
#[derive(Debug, Clone)]
struct PriceProvider {
    name: &'static str,
    url: String,
    pointer: &'static str,
}

/// Jupiter first, CoinGecko second, configured constant last
#[derive(Clone)]
pub struct SpotPriceClient {
    client: Client,
    providers: Vec<PriceProvider>,
    fallback_price: f64,
    timeout: Duration,
}

impl SpotPriceClient {
    pub fn new(
        jupiter_url: impl Into<String>,
        coingecko_url: impl Into<String>,
        fallback_price: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            // some providers reject requests without a user agent
            .user_agent(concat!("dlmm-bins/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BinsError::Http(e.to_string()))?;

        Ok(Self {
            client,
            providers: vec![
                PriceProvider {
                    name: "jupiter",
                    url: jupiter_url.into(),
                    pointer: "/data/SOL/price",
                },
                PriceProvider {
                    name: "coingecko",
                    url: coingecko_url.into(),
                    pointer: "/solana/usd",
                },
            ],
            fallback_price,
            timeout,
        })
    }

    async fn fetch(&self, provider: &PriceProvider) -> Result<f64> {
        let url = Url::parse(&provider.url)
            .map_err(|e| BinsError::InvalidResponse(format!("bad price URL: {}", e)))?;
        let body = fetch_json(&self.client, url, self.timeout).await?;

        body.pointer(provider.pointer)
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                BinsError::InvalidResponse(format!("{} reply has no price", provider.name))
            })
    }
}

#[async_trait]
impl SpotPriceSource for SpotPriceClient {
    async fn quote(&self) -> SpotPrice {
        for provider in &self.providers {
            match self.fetch(provider).await {
                Ok(price) => {
                    return SpotPrice {
                        price,
                        source: provider.name.to_string(),
                    }
                }
                Err(e) => warn!("{} price fetch failed: {}", provider.name, e),
            }
        }

        SpotPrice {
            price: self.fallback_price,
            source: "fallback".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SpotPriceClient {
        SpotPriceClient::new(
            format!("{}/jup", server.uri()),
            format!("{}/cg", server.uri()),
            100.0,
            Duration::from_millis(500),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_jupiter_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"SOL": {"price": 151.25}}
            })))
            .mount(&server)
            .await;

        let quote = client_for(&server).quote().await;
        assert_eq!(quote, SpotPrice { price: 151.25, source: "jupiter".to_string() });
    }

    #[tokio::test]
    async fn test_coingecko_when_jupiter_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jup"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "solana": {"usd": 149.0}
            })))
            .mount(&server)
            .await;

        let quote = client_for(&server).quote().await;
        assert_eq!(quote.source, "coingecko");
        assert_eq!(quote.price, 149.0);
    }

    #[tokio::test]
    async fn test_fallback_when_all_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jup"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cg"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let quote = client_for(&server).quote().await;
        assert_eq!(quote, SpotPrice { price: 100.0, source: "fallback".to_string() });
    }
}
