//! CoinGecko simple price source.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::prices::types::{PriceData, PriceError, PriceResult};
use crate::prices::PriceSource;

const SOURCE: &str = "coingecko";

#[derive(Debug, Deserialize)]
struct SimpleQuote {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
}

/// Primary source: `/api/v3/simple/price`.
#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// CoinGecko coin id for a ticker symbol.
pub fn coin_id(symbol: &str) -> String {
    match symbol.to_ascii_uppercase().as_str() {
        "BTC" => "bitcoin".to_string(),
        "ETH" => "ethereum".to_string(),
        "SOL" => "solana".to_string(),
        _ => symbol.to_ascii_lowercase(),
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, symbols: &[&str]) -> PriceResult<HashMap<String, PriceData>> {
        let by_id: HashMap<String, String> = symbols
            .iter()
            .map(|s| (coin_id(s), s.to_ascii_uppercase()))
            .collect();
        let ids = by_id.keys().cloned().collect::<Vec<_>>().join(",");

        tracing::debug!(ids = %ids, "Fetching prices from CoinGecko");

        let response = self
            .http
            .get(format!("{}/api/v3/simple/price", self.base_url))
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PriceError::Status {
                source_name: SOURCE,
                status: response.status().as_u16(),
            });
        }

        let quotes: HashMap<String, SimpleQuote> = response.json().await?;

        let prices = quotes
            .into_iter()
            .filter_map(|(id, quote)| {
                let symbol = by_id
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| id.to_ascii_uppercase());
                let price = quote.usd?;
                let data = PriceData::new(symbol.clone(), price, quote.usd_24h_change.unwrap_or(0.0));
                Some((symbol, data))
            })
            .collect();

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_ids() {
        assert_eq!(coin_id("BTC"), "bitcoin");
        assert_eq!(coin_id("eth"), "ethereum");
        assert_eq!(coin_id("SOL"), "solana");
        assert_eq!(coin_id("MOVE"), "move");
    }
}
