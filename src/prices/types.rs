//! Price data types.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

/// Errors from price sources.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name} API error: {status}")]
    Status { source_name: &'static str, status: u16 },

    #[error("Invalid response from {source_name}: {reason}")]
    InvalidResponse {
        source_name: &'static str,
        reason: String,
    },

    #[error("No price feed configured for {0}")]
    UnknownFeed(String),

    #[error("No price available for {0}")]
    Unavailable(String),
}

pub type PriceResult<T> = Result<T, PriceError>;

/// Quote of one asset in USD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceData {
    pub symbol: String,
    pub price: f64,
    /// 24h change in percent.
    pub change_24h: f64,
    /// Unix milliseconds.
    pub last_updated: u64,
}

impl PriceData {
    pub fn new(symbol: impl Into<String>, price: f64, change_24h: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change_24h,
            last_updated: now_millis(),
        }
    }
}

/// BTC/ETH/SOL basket priced from one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundlePrice {
    pub btc: PriceData,
    pub eth: PriceData,
    pub sol: PriceData,
    /// Weighted value (50/30/20); 0 when degraded.
    pub bundle_value: f64,
    pub timestamp: u64,
    /// Both sources failed and the quotes are static placeholders.
    pub degraded: bool,
}

/// Result of [`calculate_position_pnl`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionPnl {
    pub pnl: f64,
    pub pnl_percent: f64,
    pub current_value: f64,
}

/// Symbols and weights of the bundle.
pub const BUNDLE_WEIGHTS: [(&str, f64); 3] = [("BTC", 0.5), ("ETH", 0.3), ("SOL", 0.2)];

/// Weighted value of a bundle.
pub fn bundle_value(btc: f64, eth: f64, sol: f64) -> f64 {
    btc * BUNDLE_WEIGHTS[0].1 + eth * BUNDLE_WEIGHTS[1].1 + sol * BUNDLE_WEIGHTS[2].1
}

/// Leveraged PnL of a position between `entry` and `current` prices.
///
/// A zero entry price yields a zero change rather than a division by zero.
pub fn calculate_position_pnl(
    entry: f64,
    current: f64,
    margin: f64,
    leverage: f64,
    is_long: bool,
) -> PositionPnl {
    let change = if entry == 0.0 {
        0.0
    } else if is_long {
        (current - entry) / entry
    } else {
        (entry - current) / entry
    };

    let pnl = margin * change * leverage;
    PositionPnl {
        pnl,
        pnl_percent: change * leverage * 100.0,
        current_value: margin + pnl,
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
