//! Move network types and errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::storage::StorageError;

/// Decimals of the native coin (1 MOVE = 10^8 octas).
pub const OCTA_DECIMALS: u32 = 8;
pub const OCTAS_PER_COIN: u64 = 100_000_000;

/// Errors from the Move network backend.
#[derive(Debug, Error)]
pub enum MovementError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{0}")]
    Validation(String),

    #[error("Wallet not initialized")]
    WalletNotInitialized,

    #[error("Transaction {hash} failed: {vm_status}")]
    TransactionFailed { hash: String, vm_status: String },

    #[error("Transaction {0} not committed in time")]
    Timeout(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type MovementResult<T> = Result<T, MovementError>;

/// Result of loading or creating the Move account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveInitOutcome {
    pub address: String,
    pub is_new: bool,
}

/// Entry function call as accepted by the REST API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryFunction {
    #[serde(rename = "type")]
    kind: &'static str,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl EntryFunction {
    pub fn new(function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            kind: "entry_function_payload",
            function: function.into(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

/// View function request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRequest {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

/// Payment counters and volumes of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentStats {
    pub sent_count: u64,
    pub received_count: u64,
    /// Coins, 8 decimals.
    pub total_sent: String,
    pub total_received: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountInfo {
    pub sequence_number: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmittedTransaction {
    pub hash: String,
}

/// Committed or pending transaction as returned by `/transactions/by_hash`.
#[derive(Debug, Deserialize)]
pub(crate) struct TransactionStatus {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub vm_status: Option<String>,
}

/// Parse a decimal coin amount into octas without going through floats.
pub fn parse_octas(amount: &str) -> MovementResult<u64> {
    let amount = amount.trim();
    let invalid = || MovementError::InvalidAmount(amount.to_string());

    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > OCTA_DECIMALS as usize {
        return Err(MovementError::InvalidAmount(format!(
            "{} has more than {} decimals",
            amount, OCTA_DECIMALS
        )));
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let frac_octas: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = OCTA_DECIMALS as usize);
        padded.parse().map_err(|_| invalid())?
    };

    let octas = whole
        .checked_mul(OCTAS_PER_COIN)
        .and_then(|w| w.checked_add(frac_octas))
        .ok_or_else(invalid)?;
    if octas == 0 {
        return Err(MovementError::InvalidAmount(
            "Amount must be greater than zero".to_string(),
        ));
    }
    Ok(octas)
}

/// Format octas as a coin amount with 8 decimals.
pub fn format_octas(octas: u64) -> String {
    format!(
        "{}.{:08}",
        octas / OCTAS_PER_COIN,
        octas % OCTAS_PER_COIN
    )
}

/// Canonical `0x` + 64 lower-case hex form of an account address.
pub fn normalize_address(address: &str) -> MovementResult<String> {
    let trimmed = address.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.is_empty() || hex.len() > 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MovementError::InvalidAddress(address.to_string()));
    }
    Ok(format!("0x{:0>64}", hex.to_ascii_lowercase()))
}

/// Read an integer returned by a view function (u64 values arrive as strings).
pub(crate) fn value_as_u64(value: &Value) -> MovementResult<u64> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| MovementError::InvalidResponse(format!("not an integer: {}", s))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| MovementError::InvalidResponse(format!("not a u64: {}", n))),
        other => Err(MovementError::InvalidResponse(format!(
            "expected integer, got {}",
            other
        ))),
    }
}
