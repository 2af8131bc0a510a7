//! Binance 24h ticker source.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::prices::types::{PriceData, PriceError, PriceResult};
use crate::prices::PriceSource;

const SOURCE: &str = "binance";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    last_price: String,
    price_change_percent: String,
}

/// Fallback source: one `{SYMBOL}USDT` ticker request per symbol.
#[derive(Debug, Clone)]
pub struct BinanceSource {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_one(&self, symbol: &str) -> PriceResult<PriceData> {
        let response = self
            .http
            .get(format!("{}/api/v3/ticker/24hr", self.base_url))
            .query(&[("symbol", format!("{}USDT", symbol))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PriceError::Status {
                source_name: SOURCE,
                status: response.status().as_u16(),
            });
        }

        let ticker: Ticker = response.json().await?;
        let parse = |field: &str, value: &str| {
            value.parse::<f64>().map_err(|e| PriceError::InvalidResponse {
                source_name: SOURCE,
                reason: format!("{} '{}': {}", field, value, e),
            })
        };

        Ok(PriceData::new(
            symbol,
            parse("lastPrice", &ticker.last_price)?,
            parse("priceChangePercent", &ticker.price_change_percent)?,
        ))
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    /// Symbols that fail are skipped; an empty result is an error.
    async fn fetch(&self, symbols: &[&str]) -> PriceResult<HashMap<String, PriceData>> {
        let mut prices = HashMap::new();

        for symbol in symbols {
            let symbol = symbol.to_ascii_uppercase();
            match self.fetch_one(&symbol).await {
                Ok(data) => {
                    prices.insert(symbol, data);
                }
                Err(e) => tracing::debug!(symbol = %symbol, error = %e, "Binance ticker skipped"),
            }
        }

        if prices.is_empty() {
            return Err(PriceError::Unavailable(symbols.join(",")));
        }
        Ok(prices)
    }
}
