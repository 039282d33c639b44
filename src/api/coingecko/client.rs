use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::api::source::MarketDataSource;
use crate::error::{CoinPulseError, Result};
use crate::models::{Asset, MarketChart, PricePoint};

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Response bodies keyed by request, kept for `ttl`.
#[derive(Debug)]
struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl ResponseCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, body)| body.clone())
    }

    fn put(&self, key: String, body: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        entries.insert(key, (Instant::now(), body));
    }
}

pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    cache: ResponseCache,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, cache_ttl: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("coinpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoinPulseError::fetch("HTTP client", e))?;

        Ok(Self::with_http(http, base_url, cache_ttl))
    }

    pub fn with_http(http: Client, base_url: impl Into<String>, cache_ttl: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: ResponseCache::new(cache_ttl),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let key = cache_key(path, query);
        if let Some(body) = self.cache.get(&key) {
            debug!("Cache hit for {}", key);
            return parse_body(what, &body);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let res = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                error!("Error fetching {}: {}", what, e);
                CoinPulseError::fetch(what, e)
            })?;

        let status = res.status();
        if !status.is_success() {
            error!("Error fetching {}: HTTP {}", what, status);
            return Err(CoinPulseError::fetch(what, format!("HTTP {status}")));
        }

        let body = res.text().await.map_err(|e| CoinPulseError::fetch(what, e))?;
        let parsed = parse_body(what, &body)?;
        self.cache.put(key, body);
        Ok(parsed)
    }
}

fn cache_key(path: &str, query: &[(&str, String)]) -> String {
    let params: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}?{}", path, params.join("&"))
}

fn parse_body<T: DeserializeOwned>(what: &'static str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse {}: {}", what, e);
        CoinPulseError::fetch(what, e)
    })
}

fn market_query() -> Vec<(&'static str, String)> {
    vec![
        ("vs_currency", "usd".to_string()),
        ("sparkline", "true".to_string()),
        ("price_change_percentage", "7d".to_string()),
    ]
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_snapshot(&self, limit: usize) -> Result<Vec<Asset>> {
        let mut query = market_query();
        query.push(("order", "market_cap_desc".to_string()));
        query.push(("per_page", limit.to_string()));
        query.push(("page", "1".to_string()));

        self.get_json("market data", "/coins/markets", &query).await
    }

    async fn fetch_series(&self, asset_id: &str, days: u32) -> Result<Vec<PricePoint>> {
        let query = [
            ("vs_currency", "usd".to_string()),
            ("days", days.to_string()),
        ];
        let path = format!("/coins/{asset_id}/market_chart");

        let chart: MarketChart = self.get_json("chart data", &path, &query).await?;
        Ok(chart.into_points())
    }

    async fn fetch_asset(&self, asset_id: &str) -> Result<Option<Asset>> {
        let mut query = market_query();
        query.push(("ids", asset_id.to_string()));

        let assets: Vec<Asset> = self
            .get_json("asset details", "/coins/markets", &query)
            .await?;
        Ok(assets.into_iter().next())
    }
}
