//! Price fetching subsystem.
//!
//! # Data Flow
//! ```text
//! get_price(symbol):
//!     → cache.rs (fresh within TTL?)
//!     → coingecko.rs (primary) → binance.rs (fallback)
//!     → expired cache entry as last resort → PriceError::Unavailable
//!
//! Pyth (pyth.rs):
//!     symbol → feed id → Hermes latest_price_feeds → scale by expo → staleness
//! ```

pub mod binance;
pub mod cache;
pub mod coingecko;
pub mod pyth;
pub mod service;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;

pub use binance::BinanceSource;
pub use cache::PriceCache;
pub use coingecko::CoinGeckoSource;
pub use pyth::{PythBundle, PythOracle, PythPrice, DEFAULT_MIN_CONFIDENCE};
pub use service::PriceService;
pub use types::{
    calculate_position_pnl, BundlePrice, PositionPnl, PriceData, PriceError, PriceResult,
};

/// A REST API that quotes symbols in USD.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Prices keyed by upper-case symbol. Symbols the source does not know
    /// are absent from the map.
    async fn fetch(&self, symbols: &[&str]) -> PriceResult<HashMap<String, PriceData>>;
}
