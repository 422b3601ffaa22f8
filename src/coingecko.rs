use crate::models::CryptoMarketData;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// One row of CoinGecko's `coins/markets` response. Only the columns the
/// platform reads are declared; everything nullable upstream is optional here.
#[derive(Deserialize, Debug, Clone)]
pub struct CoinMarket {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub current_price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub price_change_percentage_24h: Option<Decimal>,
    pub price_change_percentage_1h_in_currency: Option<Decimal>,
    pub price_change_percentage_24h_in_currency: Option<Decimal>,
}

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("invalid market data URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("market data request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("market data provider answered HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("coin '{0}' not found")]
    CoinNotFound(String),
}

type QuoteCache = HashMap<String, (CryptoMarketData, Instant)>;

/// Client for the CoinGecko price feed, quoting in EUR.
///
/// Per-coin quotes are kept for `cache_ttl`; a zero TTL turns the cache off.
#[derive(Clone)]
pub struct PriceFeed {
    client: reqwest::Client,
    base_url: Url,
    cache_ttl: Duration,
    cache: Arc<Mutex<QuoteCache>>,
}

impl PriceFeed {
    pub fn new(base_url: &str, cache_ttl: Duration) -> Result<Self, MarketError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(concat!("cryptofolio-backend/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(PriceFeed {
            client,
            base_url: with_trailing_slash(base_url)?,
            cache_ttl,
            cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Current EUR price and 1h/24h change for a single coin.
    pub async fn market_data(&self, crypto_id: &str) -> Result<CryptoMarketData, MarketError> {
        if !self.cache_ttl.is_zero() {
            let cache = self.cache.lock().await;
            if let Some((data, fetched_at)) = cache.get(crypto_id) {
                if fetched_at.elapsed() < self.cache_ttl {
                    return Ok(data.clone());
                }
            }
        }

        let mut url = self.base_url.join("coins/markets")?;
        url.query_pairs_mut()
            .append_pair("vs_currency", "eur")
            .append_pair("ids", crypto_id)
            .append_pair("price_change_percentage", "1h,24h");

        let coin = self
            .fetch(url)
            .await?
            .into_iter()
            .find(|coin| coin.id == crypto_id)
            .ok_or_else(|| MarketError::CoinNotFound(crypto_id.to_string()))?;

        let data = CryptoMarketData {
            id: coin.id,
            current_price_eur: coin.current_price.unwrap_or_default(),
            change_1h: coin.price_change_percentage_1h_in_currency.unwrap_or_default(),
            change_24h: coin.price_change_percentage_24h_in_currency.unwrap_or_default(),
        };

        if !self.cache_ttl.is_zero() {
            remember(&mut *self.cache.lock().await, self.cache_ttl, &data);
        }

        Ok(data)
    }

    /// The `limit` largest coins by market capitalisation.
    pub async fn top_by_market_cap(&self, limit: u32) -> Result<Vec<CoinMarket>, MarketError> {
        let mut url = self.base_url.join("coins/markets")?;
        url.query_pairs_mut()
            .append_pair("vs_currency", "eur")
            .append_pair("order", "market_cap_desc")
            .append_pair("per_page", &limit.to_string())
            .append_pair("page", "1")
            .append_pair("sparkline", "false")
            .append_pair("price_change_percentage", "24h");

        self.fetch(url).await
    }

    async fn fetch(&self, url: Url) -> Result<Vec<CoinMarket>, MarketError> {
        tracing::debug!(%url, "querying price feed");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MarketError::Status(response.status()));
        }

        Ok(response.json::<Vec<CoinMarket>>().await?)
    }
}

// Keyed by the id CoinGecko returned; stale quotes are dropped on the way in.
fn remember(cache: &mut QuoteCache, ttl: Duration, data: &CryptoMarketData) {
    cache.retain(|_, (_, fetched_at)| fetched_at.elapsed() < ttl);
    cache.insert(data.id.clone(), (data.clone(), Instant::now()));
}

// Url::join drops the last path segment unless the base ends with a slash.
fn with_trailing_slash(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}
