use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::config::NetworkEndpoints;
use crate::normalizers::{find_records, record_address};
use crate::types::*;

const USER_AGENT: &str = concat!("dlmm-bins/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the per-network DLMM REST indexer
#[derive(Clone)]
pub struct IndexerClient {
    client: Client,
    endpoints: NetworkEndpoints,
    timeout: Duration,
}

impl IndexerClient {
    pub fn new(endpoints: NetworkEndpoints, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BinsError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoints,
            timeout,
        })
    }

    /// Build `{base}{template}` for a network, substituting `{address}` and
    /// appending `<param>=<cluster>` when a parameter spelling is given
    pub fn url_for(
        &self,
        network: Network,
        template: &str,
        address: &str,
        param: Option<&str>,
    ) -> Result<Url> {
        let base = self.endpoints.for_network(network).trim_end_matches('/');
        let path = template.replace("{address}", address);
        let mut url = Url::parse(&format!("{}{}", base, path))
            .map_err(|e| BinsError::InvalidResponse(format!("bad indexer URL: {}", e)))?;

        if let Some(param) = param {
            url.query_pairs_mut().append_pair(param, network.cluster());
        }

        Ok(url)
    }

    /// GET a JSON document, bounded by the per-call timeout
    pub async fn get_json(&self, url: Url) -> Result<Value> {
        fetch_json(&self.client, url, self.timeout).await
    }

    /// Fetch the pool listing, trying each path until one returns records
    pub async fn list_pools(&self, network: Network, paths: &[String]) -> Result<Vec<Value>> {
        let mut last_error = BinsError::InvalidResponse("no listing paths configured".to_string());

        for path in paths {
            let url = self.url_for(network, path, "", None)?;
            match self.get_json(url.clone()).await {
                Ok(body) => match find_records(&body) {
                    Some(records) => return Ok(records.clone()),
                    None => {
                        last_error =
                            BinsError::InvalidResponse(format!("no pool records at {}", url));
                    }
                },
                Err(e) => {
                    debug!("Listing {} failed: {}", url, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Pools for the picker, labelled by name, symbol or abbreviated address
    pub async fn sample_pools(
        &self,
        network: Network,
        paths: &[String],
        limit: usize,
    ) -> Result<Vec<SamplePool>> {
        let records = self.list_pools(network, paths).await?;

        Ok(records
            .iter()
            .filter_map(|record| {
                let address = record.get("address").and_then(Value::as_str)?;
                if address.is_empty() {
                    return None;
                }
                let label = ["name", "symbol"]
                    .iter()
                    .find_map(|k| record.get(*k).and_then(Value::as_str))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| abbreviate(address));
                Some(SamplePool {
                    address: address.to_string(),
                    label,
                })
            })
            .take(limit)
            .collect())
    }

    /// Linear search of a listing for the record matching `address`
    pub fn find_pool<'a>(records: &'a [Value], address: &str) -> Option<&'a Value> {
        records
            .iter()
            .find(|record| record_address(record) == Some(address))
    }
}

/// Shared GET-and-decode with timeout, status and JSON checks
pub(crate) async fn fetch_json(client: &Client, url: Url, timeout: Duration) -> Result<Value> {
    let started = Instant::now();
    let request = client
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "application/json")
        .send();

    let response = match tokio::time::timeout(timeout, request).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => return Err(BinsError::Http(e.to_string())),
        Err(_) => {
            return Err(BinsError::Timeout {
                url: url.to_string(),
                millis: timeout.as_millis() as u64,
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

    let remaining = timeout.saturating_sub(started.elapsed());
    match tokio::time::timeout(remaining, response.json::<Value>()).await {
        Ok(Ok(body)) => {
            debug!("GET {} -> {} in {}ms", url, status, started.elapsed().as_millis());
            Ok(body)
        }
        Ok(Err(e)) => Err(BinsError::InvalidResponse(e.to_string())),
        Err(_) => Err(BinsError::Timeout {
            url: url.to_string(),
            millis: timeout.as_millis() as u64,
        }),
    }
}

/// `ABCD…WXYZ`
fn abbreviate(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
