//! Chain-specific types and error definitions.

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::storage::StorageError;

/// Decimals of the native EVM token.
pub const NATIVE_DECIMALS: u8 = 18;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} ms")]
    Timeout(u64),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction not confirmed after {0} blocks")]
    ConfirmationTimeout(u32),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or signing error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// No signing key has been loaded yet.
    #[error("Wallet not initialized - call initialize_wallet() first")]
    WalletNotInitialized,

    /// Malformed or badly checksummed address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount could not be parsed or is not positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Balance does not cover value plus fees.
    #[error("Insufficient balance. Available: {available}, required: {required}")]
    InsufficientBalance { available: String, required: String },

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Input rejected before submission.
    #[error("{0}")]
    Validation(String),

    /// Contract call data could not be decoded.
    #[error("Contract error: {0}")]
    Contract(String),

    /// Key or local storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is pending in mempool.
    Pending,
    /// Transaction has been mined but not enough confirmations.
    Confirming { current: u32, required: u32 },
    /// Transaction is confirmed with required block depth.
    Confirmed { block_number: u64, gas_used: u64 },
    /// Transaction failed or was dropped.
    Failed(String),
}

/// Parse an EVM address.
///
/// The `0x` prefix is optional. All-lowercase and all-uppercase hex are
/// accepted as is; mixed case must carry a valid EIP-55 checksum.
pub fn parse_address(value: &str) -> BlockchainResult<Address> {
    let trimmed = value.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BlockchainError::InvalidAddress(value.to_string()));
    }

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    let prefixed = format!("0x{}", body);

    let parsed = if has_lower && has_upper {
        Address::parse_checksummed(&prefixed, None).ok()
    } else {
        prefixed.parse::<Address>().ok()
    };

    parsed.ok_or_else(|| BlockchainError::InvalidAddress(value.to_string()))
}

/// Parse a positive decimal amount into base units.
pub fn parse_amount(value: &str, decimals: u8) -> BlockchainResult<U256> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(BlockchainError::InvalidAmount(value.to_string()));
    }

    let parsed = parse_units(trimmed, decimals)
        .map_err(|e| BlockchainError::InvalidAmount(format!("{}: {}", value, e)))?
        .get_absolute();

    if parsed.is_zero() {
        return Err(BlockchainError::InvalidAmount(format!(
            "{}: amount must be greater than zero",
            value
        )));
    }
    Ok(parsed)
}

/// Parse a native token amount (18 decimals) into wei.
pub fn parse_ether_amount(value: &str) -> BlockchainResult<U256> {
    parse_amount(value, NATIVE_DECIMALS)
}

/// Format base units as a decimal string without trailing zeros.
pub fn format_amount(value: U256, decimals: u8) -> String {
    let formatted = format_units(value, decimals).unwrap_or_else(|_| value.to_string());
    trim_decimal(&formatted)
}

/// Format wei as a native token amount.
pub fn format_ether(value: U256) -> String {
    format_amount(value, NATIVE_DECIMALS)
}

fn trim_decimal(value: &str) -> String {
    match value.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{}.0", whole)
            } else {
                format!("{}.{}", whole, fraction)
            }
        }
        None => format!("{}.0", value),
    }
}
