//! Price service with fallback and caching.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PriceConfig;
use crate::observability::metrics;
use crate::prices::binance::BinanceSource;
use crate::prices::cache::PriceCache;
use crate::prices::coingecko::CoinGeckoSource;
use crate::prices::types::{
    bundle_value, calculate_position_pnl, now_millis, BundlePrice, PositionPnl, PriceData,
    PriceError, PriceResult, BUNDLE_WEIGHTS,
};
use crate::prices::PriceSource;

/// Placeholder quotes returned when no source answers.
const FALLBACK_QUOTES: [(&str, f64); 3] = [("BTC", 43_500.0), ("ETH", 2_300.0), ("SOL", 98.0)];

/// Build the HTTP client shared by all price sources.
pub fn http_client(timeout: Duration) -> PriceResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// USD prices from a primary source with a fallback.
#[derive(Clone)]
pub struct PriceService {
    primary: Arc<dyn PriceSource>,
    fallback: Arc<dyn PriceSource>,
    cache: PriceCache<f64>,
}

impl PriceService {
    /// CoinGecko first, Binance second.
    pub fn new(config: &PriceConfig) -> PriceResult<Self> {
        let http = http_client(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::with_sources(
            Arc::new(CoinGeckoSource::new(http.clone(), &config.coingecko_url)),
            Arc::new(BinanceSource::new(http, &config.binance_url)),
            Duration::from_secs(config.cache_ttl_secs),
        ))
    }

    pub fn with_sources(
        primary: Arc<dyn PriceSource>,
        fallback: Arc<dyn PriceSource>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            cache: PriceCache::new(cache_ttl),
        }
    }

    /// Price of one symbol in USD.
    ///
    /// Order: fresh cache, primary, fallback, expired cache.
    pub async fn get_price(&self, symbol: &str) -> PriceResult<f64> {
        let symbol = symbol.trim().to_ascii_uppercase();

        if let Some(price) = self.cache.get_fresh(&symbol) {
            metrics::record_price_cache("hit");
            return Ok(price);
        }
        metrics::record_price_cache("miss");

        for source in [&self.primary, &self.fallback] {
            match self.fetch_from(source.as_ref(), &[symbol.as_str()]).await {
                Ok(prices) => {
                    if let Some(data) = prices.get(&symbol) {
                        return Ok(data.price);
                    }
                    tracing::debug!(source = source.name(), symbol = %symbol, "Symbol missing from response");
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), symbol = %symbol, error = %e, "Price source failed")
                }
            }
        }

        match self.cache.get_any(&symbol) {
            Some(price) => {
                metrics::record_price_cache("stale");
                tracing::warn!(symbol = %symbol, "Serving expired cached price");
                Ok(price)
            }
            None => Err(PriceError::Unavailable(symbol)),
        }
    }

    /// Bundle quote; static placeholders flagged `degraded` when both sources fail.
    pub async fn get_bundle_prices(&self) -> BundlePrice {
        let symbols: Vec<&str> = BUNDLE_WEIGHTS.iter().map(|(s, _)| *s).collect();

        for source in [&self.primary, &self.fallback] {
            match self.fetch_from(source.as_ref(), &symbols).await {
                Ok(mut prices) => {
                    if let (Some(btc), Some(eth), Some(sol)) =
                        (prices.remove("BTC"), prices.remove("ETH"), prices.remove("SOL"))
                    {
                        return BundlePrice {
                            bundle_value: bundle_value(btc.price, eth.price, sol.price),
                            btc,
                            eth,
                            sol,
                            timestamp: now_millis(),
                            degraded: false,
                        };
                    }
                    tracing::warn!(source = source.name(), "Incomplete bundle prices");
                }
                Err(e) => tracing::warn!(source = source.name(), error = %e, "Bundle price fetch failed"),
            }
        }

        tracing::error!("All price sources failed, returning placeholder bundle");
        let [btc, eth, sol] = FALLBACK_QUOTES.map(|(symbol, price)| PriceData::new(symbol, price, 0.0));
        BundlePrice {
            btc,
            eth,
            sol,
            bundle_value: 0.0,
            timestamp: now_millis(),
            degraded: true,
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// See [`calculate_position_pnl`].
    pub fn calculate_position_pnl(
        &self,
        entry: f64,
        current: f64,
        margin: f64,
        leverage: f64,
        is_long: bool,
    ) -> PositionPnl {
        calculate_position_pnl(entry, current, margin, leverage, is_long)
    }

    async fn fetch_from(
        &self,
        source: &dyn PriceSource,
        symbols: &[&str],
    ) -> PriceResult<HashMap<String, PriceData>> {
        match source.fetch(symbols).await {
            Ok(prices) => {
                metrics::record_price_fetch(source.name(), "ok");
                for (symbol, data) in &prices {
                    self.cache.insert(symbol, data.price);
                }
                Ok(prices)
            }
            Err(e) => {
                metrics::record_price_fetch(source.name(), "error");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for PriceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceService")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .field("cache_ttl", &self.cache.ttl())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    struct FixedSource {
        name: &'static str,
        prices: Option<Vec<(&'static str, f64)>>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(name: &'static str, prices: Option<Vec<(&'static str, f64)>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                prices,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, symbols: &[&str]) -> PriceResult<HashMap<String, PriceData>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prices = self
                .prices
                .as_ref()
                .ok_or_else(|| PriceError::Unavailable(symbols.join(",")))?;
            Ok(prices
                .iter()
                .filter(|(s, _)| symbols.contains(s))
                .map(|(s, p)| (s.to_string(), PriceData::new(*s, *p, 1.5)))
                .collect())
        }
    }

    const ALL: [(&str, f64); 3] = [("BTC", 100.0), ("ETH", 10.0), ("SOL", 1.0)];

    #[tokio::test]
    async fn test_cache_hit_skips_sources() {
        let primary = FixedSource::new("primary", Some(ALL.to_vec()));
        let service = PriceService::with_sources(
            primary.clone(),
            FixedSource::new("fallback", None),
            Duration::from_secs(30),
        );

        assert_eq!(service.get_price("btc").await.unwrap(), 100.0);
        assert_eq!(service.get_price("BTC").await.unwrap(), 100.0);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);

        service.clear_cache();
        service.get_price("BTC").await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_then_error() {
        let service = PriceService::with_sources(
            FixedSource::new("primary", None),
            FixedSource::new("fallback", Some(vec![("ETH", 2_000.0)])),
            Duration::from_secs(30),
        );

        assert_eq!(service.get_price("ETH").await.unwrap(), 2_000.0);
        assert!(matches!(
            service.get_price("DOGE").await,
            Err(PriceError::Unavailable(s)) if s == "DOGE"
        ));
    }

    #[tokio::test]
    async fn test_expired_cache_is_last_resort() {
        let primary = FixedSource::new("primary", Some(ALL.to_vec()));
        let warm = PriceService::with_sources(
            primary,
            FixedSource::new("fallback", None),
            Duration::from_millis(1),
        );
        warm.get_price("SOL").await.unwrap();

        let broken = PriceService {
            primary: FixedSource::new("primary", None),
            fallback: FixedSource::new("fallback", None),
            cache: warm.cache.clone(),
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(broken.get_price("SOL").await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_bundle_prices() {
        let service = PriceService::with_sources(
            FixedSource::new("primary", Some(ALL.to_vec())),
            FixedSource::new("fallback", None),
            Duration::from_secs(30),
        );
        let bundle = service.get_bundle_prices().await;
        assert!(!bundle.degraded);
        assert!((bundle.bundle_value - 53.2).abs() < 1e-9);
        assert_eq!(bundle.btc.symbol, "BTC");
    }

    #[tokio::test]
    async fn test_bundle_falls_back_to_placeholders() {
        let service = PriceService::with_sources(
            FixedSource::new("primary", Some(vec![("BTC", 100.0)])),
            FixedSource::new("fallback", None),
            Duration::from_secs(30),
        );
        let bundle = service.get_bundle_prices().await;
        assert!(bundle.degraded);
        assert_eq!(bundle.bundle_value, 0.0);
        assert_eq!(bundle.btc.price, 43_500.0);
        assert_eq!(bundle.eth.price, 2_300.0);
        assert_eq!(bundle.sol.price, 98.0);
    }
}
