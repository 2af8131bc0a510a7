//! Pyth Hermes oracle client.
//!
//! Prices come from `/api/latest_price_feeds` and carry a confidence
//! interval plus a publish time used to flag stale quotes.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PriceConfig;
use crate::observability::metrics;
use crate::prices::cache::PriceCache;
use crate::prices::service::http_client;
use crate::prices::types::{bundle_value, now_millis, PriceError, PriceResult};

const SOURCE: &str = "pyth";

/// Minimum confidence (percent) for [`PythOracle::is_safe_for_trading`].
pub const DEFAULT_MIN_CONFIDENCE: f64 = 95.0;

/// Oracle quote in USD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PythPrice {
    pub symbol: String,
    pub price: f64,
    /// Half-width of the confidence interval in USD.
    pub confidence: f64,
    /// Publish time in Unix milliseconds.
    pub timestamp: u64,
    pub expo: i32,
    pub is_stale: bool,
}

/// BTC/ETH/SOL basket priced from the oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PythBundle {
    pub btc: PythPrice,
    pub eth: PythPrice,
    pub sol: PythPrice,
    pub bundle_value: f64,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
struct PriceFeed {
    id: String,
    price: RawPrice,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

/// Hermes client with a short-lived cache.
#[derive(Debug, Clone)]
pub struct PythOracle {
    http: reqwest::Client,
    base_url: String,
    /// Symbol to feed id (lower-case hex, no prefix).
    feeds: BTreeMap<String, String>,
    cache: PriceCache<PythPrice>,
    stale_after: Duration,
}

impl PythOracle {
    pub fn new(config: &PriceConfig) -> PriceResult<Self> {
        let http = http_client(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::with_client(
            http,
            &config.hermes_url,
            &config.pyth_feeds,
            Duration::from_secs(config.pyth_cache_ttl_secs),
            Duration::from_secs(config.pyth_stale_after_secs),
        ))
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        feeds: &BTreeMap<String, String>,
        cache_ttl: Duration,
        stale_after: Duration,
    ) -> Self {
        let feeds = feeds
            .iter()
            .map(|(symbol, id)| (symbol.to_ascii_uppercase(), normalize_feed_id(id)))
            .collect();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            feeds,
            cache: PriceCache::new(cache_ttl),
            stale_after,
        }
    }

    /// Feed id configured for `symbol`.
    pub fn feed_id(&self, symbol: &str) -> Option<&str> {
        self.feeds
            .get(&symbol.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Latest price of one symbol. On fetch failure the last cached quote is
    /// returned if there is one.
    pub async fn get_price(&self, symbol: &str) -> PriceResult<PythPrice> {
        let symbol = symbol.trim().to_ascii_uppercase();

        if let Some(price) = self.cache.get_fresh(&symbol) {
            metrics::record_price_cache("hit");
            return Ok(price);
        }
        metrics::record_price_cache("miss");

        let id = self
            .feed_id(&symbol)
            .ok_or_else(|| PriceError::UnknownFeed(symbol.clone()))?
            .to_string();

        let fetched = self
            .fetch_feeds(&[id.as_str()])
            .await
            .and_then(|feeds| {
                feeds
                    .into_iter()
                    .find(|f| normalize_feed_id(&f.id) == id)
                    .ok_or_else(|| PriceError::Unavailable(symbol.clone()))
            })
            .and_then(|feed| self.convert(&symbol, &feed.price));

        match fetched {
            Ok(price) => {
                self.cache.insert(&symbol, price.clone());
                tracing::debug!(
                    symbol = %symbol,
                    price = price.price,
                    confidence = price.confidence,
                    stale = price.is_stale,
                    "Pyth price"
                );
                Ok(price)
            }
            Err(e) => match self.cache.get_any(&symbol) {
                Some(cached) => {
                    metrics::record_price_cache("stale");
                    tracing::warn!(symbol = %symbol, error = %e, "Serving cached Pyth price");
                    Ok(cached)
                }
                None => Err(e),
            },
        }
    }

    /// Latest prices for several symbols in one request. Symbols without a
    /// configured feed and malformed feeds are skipped; feeds are matched
    /// back by id.
    pub async fn get_prices(&self, symbols: &[&str]) -> PriceResult<BTreeMap<String, PythPrice>> {
        let mut by_id: HashMap<String, String> = HashMap::new();
        for symbol in symbols {
            let symbol = symbol.trim().to_ascii_uppercase();
            match self.feed_id(&symbol) {
                Some(id) => {
                    by_id.insert(id.to_string(), symbol);
                }
                None => tracing::warn!(symbol = %symbol, "No Pyth feed configured"),
            }
        }

        if by_id.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ids: Vec<&str> = by_id.keys().map(String::as_str).collect();
        let feeds = self.fetch_feeds(&ids).await?;

        let mut result = BTreeMap::new();
        for feed in feeds {
            let Some(symbol) = by_id.get(&normalize_feed_id(&feed.id)) else {
                tracing::debug!(feed_id = %feed.id, "Ignoring unrequested feed");
                continue;
            };
            let price = match self.convert(symbol, &feed.price) {
                Ok(price) => price,
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Skipping malformed Pyth feed");
                    continue;
                }
            };
            self.cache.insert(symbol, price.clone());
            result.insert(symbol.clone(), price);
        }

        Ok(result)
    }

    /// Bundle quote; every leg must be present.
    pub async fn get_bundle_prices(&self) -> PriceResult<PythBundle> {
        let mut prices = self.get_prices(&["BTC", "ETH", "SOL"]).await?;

        match (prices.remove("BTC"), prices.remove("ETH"), prices.remove("SOL")) {
            (Some(btc), Some(eth), Some(sol)) => Ok(PythBundle {
                bundle_value: bundle_value(btc.price, eth.price, sol.price),
                btc,
                eth,
                sol,
                timestamp: now_millis(),
            }),
            _ => Err(PriceError::Unavailable("BTC,ETH,SOL bundle".to_string())),
        }
    }

    /// `(price - conf, price, price + conf)`.
    pub fn confidence_bounds(price: &PythPrice) -> (f64, f64, f64) {
        (
            price.price - price.confidence,
            price.price,
            price.price + price.confidence,
        )
    }

    /// `(1 - conf / price) * 100`, clamped to `0..=100`.
    pub fn confidence_percentage(price: &PythPrice) -> f64 {
        if price.price <= 0.0 {
            return 0.0;
        }
        ((1.0 - price.confidence / price.price) * 100.0).clamp(0.0, 100.0)
    }

    /// Fresh and at least `min_confidence` percent confident.
    pub fn is_safe_for_trading(price: &PythPrice, min_confidence: f64) -> bool {
        !price.is_stale && Self::confidence_percentage(price) >= min_confidence
    }

    /// Whether the quote is older than the stale threshold right now.
    pub fn is_price_stale(&self, price: &PythPrice) -> bool {
        now_millis().saturating_sub(price.timestamp) > self.stale_after.as_millis() as u64
    }

    /// Age of the quote as "12s ago", "3m ago" or "2h ago".
    pub fn format_age(price: &PythPrice) -> String {
        format_age_at(price.timestamp, now_millis())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::debug!("Pyth price cache cleared");
    }

    async fn fetch_feeds(&self, ids: &[&str]) -> PriceResult<Vec<PriceFeed>> {
        let result = self.request_feeds(ids).await;
        metrics::record_price_fetch(SOURCE, if result.is_ok() { "ok" } else { "error" });
        result
    }

    async fn request_feeds(&self, ids: &[&str]) -> PriceResult<Vec<PriceFeed>> {
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids[]", *id)).collect();

        let response = self
            .http
            .get(format!("{}/api/latest_price_feeds", self.base_url))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PriceError::Status {
                source_name: SOURCE,
                status: response.status().as_u16(),
            });
        }
        let entries: Vec<serde_json::Value> = response.json().await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<PriceFeed>(entry) {
                Ok(feed) => Some(feed),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable Pyth feed");
                    None
                }
            })
            .collect())
    }

    fn convert(&self, symbol: &str, raw: &RawPrice) -> PriceResult<PythPrice> {
        let parse = |field: &str, value: &str| {
            value.parse::<i64>().map_err(|e| PriceError::InvalidResponse {
                source_name: SOURCE,
                reason: format!("{} '{}': {}", field, value, e),
            })
        };

        let scale = 10f64.powi(raw.expo);
        let timestamp = (raw.publish_time.max(0) as u64).saturating_mul(1000);
        let age_ms = now_millis().saturating_sub(timestamp);

        Ok(PythPrice {
            symbol: symbol.to_string(),
            price: parse("price", &raw.price)? as f64 * scale,
            confidence: parse("conf", &raw.conf)? as f64 * scale,
            timestamp,
            expo: raw.expo,
            is_stale: age_ms > self.stale_after.as_millis() as u64,
        })
    }
}

/// Lower-case hex without the `0x` prefix, as Hermes reports ids.
pub fn normalize_feed_id(id: &str) -> String {
    let id = id.trim();
    id.strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .unwrap_or(id)
        .to_ascii_lowercase()
}

/// Format the age of a millisecond timestamp relative to `now_ms`.
pub fn format_age_at(timestamp_ms: u64, now_ms: u64) -> String {
    let secs = now_ms.saturating_sub(timestamp_ms) / 1000;
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64, confidence: f64, is_stale: bool) -> PythPrice {
        PythPrice {
            symbol: "BTC".to_string(),
            price,
            confidence,
            timestamp: now_millis(),
            expo: -8,
            is_stale,
        }
    }

    #[test]
    fn test_normalize_feed_id() {
        assert_eq!(normalize_feed_id("0xABcd"), "abcd");
        assert_eq!(normalize_feed_id("abcd"), "abcd");
    }

    #[test]
    fn test_confidence() {
        let q = quote(100.0, 2.0, false);
        assert_eq!(PythOracle::confidence_bounds(&q), (98.0, 100.0, 102.0));
        assert!((PythOracle::confidence_percentage(&q) - 98.0).abs() < 1e-9);
        assert!(PythOracle::is_safe_for_trading(&q, DEFAULT_MIN_CONFIDENCE));

        let wide = quote(100.0, 10.0, false);
        assert!(!PythOracle::is_safe_for_trading(&wide, DEFAULT_MIN_CONFIDENCE));

        let stale = quote(100.0, 0.1, true);
        assert!(!PythOracle::is_safe_for_trading(&stale, DEFAULT_MIN_CONFIDENCE));

        assert_eq!(PythOracle::confidence_percentage(&quote(1.0, 5.0, false)), 0.0);
    }

    #[test]
    fn test_format_age() {
        let now = 10_000_000;
        assert_eq!(format_age_at(now - 2_000, now), "2s ago");
        assert_eq!(format_age_at(now - 59_999, now), "59s ago");
        assert_eq!(format_age_at(now - 120_000, now), "2m ago");
        assert_eq!(format_age_at(now - 7_200_000, now), "2h ago");
        assert_eq!(format_age_at(now + 5_000, now), "0s ago");
    }

    #[test]
    fn test_convert_applies_exponent() {
        let oracle = PythOracle::with_client(
            reqwest::Client::new(),
            "http://localhost",
            &BTreeMap::new(),
            Duration::from_secs(10),
            Duration::from_secs(60),
        );
        let raw = RawPrice {
            price: "4350000000000".to_string(),
            conf: "2500000000".to_string(),
            expo: -8,
            publish_time: (now_millis() / 1000) as i64,
        };
        let price = oracle.convert("BTC", &raw).unwrap();
        assert!((price.price - 43_500.0).abs() < 1e-6);
        assert!((price.confidence - 25.0).abs() < 1e-6);
        assert!(!price.is_stale);

        let old = RawPrice {
            publish_time: 1_000,
            ..raw
        };
        assert!(oracle.convert("BTC", &old).unwrap().is_stale);
    }
}
