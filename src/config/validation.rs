//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs and contract addresses
//! - Validate value ranges (timeouts > 0, retry bounds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::blockchain::network::NetworkProfile;
use crate::blockchain::types::parse_address;
use crate::config::schema::WalletConfig;

/// Upper bound for `rpc.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_profile("network.testnet", &config.network.testnet, &mut errors);
    validate_profile("network.mainnet", &config.network.mainnet, &mut errors);

    if config.rpc.timeout_ms == 0 {
        errors.push(ValidationError::new("rpc.timeout_ms", "must be greater than 0"));
    }
    if config.rpc.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "rpc.max_retries",
            format!("must be at most {}", MAX_RETRIES_LIMIT),
        ));
    }

    let tx = &config.transactions;
    if tx.gas_buffer_percent > 100 {
        errors.push(ValidationError::new(
            "transactions.gas_buffer_percent",
            "must be at most 100",
        ));
    }
    if tx.confirmations == 0 {
        errors.push(ValidationError::new(
            "transactions.confirmations",
            "must be at least 1",
        ));
    }
    if tx.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "transactions.confirmation_timeout_secs",
            "must be greater than 0",
        ));
    }
    if tx.poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "transactions.poll_interval_ms",
            "must be greater than 0",
        ));
    }

    for (field, value) in [
        ("contracts.calendar_payments", &config.contracts.calendar_payments),
        ("contracts.payments", &config.contracts.payments),
        ("contracts.bucket_protocol", &config.contracts.bucket_protocol),
    ] {
        if parse_address(value).is_err() {
            errors.push(ValidationError::new(field, format!("invalid address '{}'", value)));
        }
    }

    if config.storage.data_dir.trim().is_empty() {
        errors.push(ValidationError::new("storage.data_dir", "must not be empty"));
    }

    for (field, value) in [
        ("prices.coingecko_url", &config.prices.coingecko_url),
        ("prices.binance_url", &config.prices.binance_url),
        ("prices.hermes_url", &config.prices.hermes_url),
        ("movement.rpc_url", &config.movement.rpc_url),
        ("movement.faucet_url", &config.movement.faucet_url),
    ] {
        if !is_http_url(value) {
            errors.push(ValidationError::new(field, format!("invalid URL '{}'", value)));
        }
    }
    if config.prices.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "prices.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.keeper.interval_secs == 0 {
        errors.push(ValidationError::new("keeper.interval_secs", "must be greater than 0"));
    }
    for (i, payer) in config.keeper.payers.iter().enumerate() {
        if parse_address(payer).is_err() {
            errors.push(ValidationError::new(
                format!("keeper.payers[{}]", i),
                format!("invalid address '{}'", payer),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_profile(prefix: &str, profile: &NetworkProfile, errors: &mut Vec<ValidationError>) {
    if profile.rpc_urls.is_empty() {
        errors.push(ValidationError::new(
            format!("{}.rpc_urls", prefix),
            "at least one RPC endpoint is required",
        ));
    }
    for (i, url) in profile.rpc_urls.iter().enumerate() {
        if !is_http_url(url) {
            errors.push(ValidationError::new(
                format!("{}.rpc_urls[{}]", prefix, i),
                format!("invalid URL '{}'", url),
            ));
        }
    }
    if profile.chain_id == 0 {
        errors.push(ValidationError::new(
            format!("{}.chain_id", prefix),
            "must be greater than 0",
        ));
    }
}

/// Whether `value` is a well-formed http(s) URL with a host.
pub fn is_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&WalletConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_rpc_list_rejected() {
        let mut config = WalletConfig::default();
        config.network.testnet.rpc_urls.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "network.testnet.rpc_urls");
    }

    #[test]
    fn test_bad_url_and_retry_bound() {
        let mut config = WalletConfig::default();
        config.network.mainnet.rpc_urls = vec!["ftp://rpc.example".to_string()];
        config.rpc.max_retries = 50;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "network.mainnet.rpc_urls[0]"));
        assert!(errors.iter().any(|e| e.field == "rpc.max_retries"));
    }

    #[test]
    fn test_keeper_payers_checked() {
        let mut config = WalletConfig::default();
        config.keeper.payers = vec!["0x1234".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "keeper.payers[0]");
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://testnet-rpc.monad.xyz"));
        assert!(is_http_url("http://127.0.0.1:8545"));
        assert!(!is_http_url("ws://127.0.0.1:8545"));
        assert!(!is_http_url("not a url"));
    }
}
