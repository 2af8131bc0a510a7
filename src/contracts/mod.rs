//! Contract call façades.
//!
//! # Data Flow
//! ```text
//! WalletService accessor (payments(), scheduled_payments(), buckets())
//!     → façade (payments.rs, scheduled.rs, bucket.rs): validate input
//!     → abi.rs (encode call data)
//!     → TxBuilder (estimate + buffer, legacy tx, confirm) or eth_call
//!     → decode return tuples into the records below
//!
//! keeper.rs:
//!     interval tick → scheduled.rs (is_executable) → execute due schedules
//! ```
//!
//! # Design Decisions
//! - One façade per deployed contract, each bound to a fixed address
//! - Reads return `Result`; an unreachable contract is an error, not an empty list
//! - Ids are positions in the per-user arrays returned by the contracts

pub mod abi;
pub mod bucket;
pub mod keeper;
pub mod payments;
pub mod scheduled;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;

use crate::blockchain::transaction::{SentTransaction, TxBuilder};
use crate::blockchain::types::{format_ether, BlockchainError, BlockchainResult};
use crate::storage::{TransactionHistory, TxKind, TxRecord, TxStatus};

pub use bucket::BucketContract;
pub use keeper::{KeeperReport, ScheduleKeeper};
pub use payments::PaymentsContract;
pub use scheduled::ScheduledPaymentsContract;

/// Instant payment sent or received by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRecord {
    pub id: usize,
    pub sender: Address,
    pub recipient: Address,
    pub amount: String,
    pub memo: String,
    pub timestamp: u64,
    pub completed: bool,
}

/// Scheduled (calendar) payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledPayment {
    pub id: u64,
    pub payer: Address,
    pub recipient: Address,
    pub amount: String,
    pub execute_at: u64,
    pub interval_seconds: u64,
    pub occurrences: u64,
    pub executed_count: u64,
    pub active: bool,
    pub escrow_balance: String,
    pub created_at: u64,
}

/// Weighted asset basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub id: u64,
    pub assets: Vec<Address>,
    pub weights: Vec<u64>,
    pub leverage: u8,
    pub owner: Address,
    pub exists: bool,
}

/// Leveraged position on a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub id: u64,
    pub bucket_id: u64,
    pub is_long: bool,
    pub margin: String,
    pub entry_price: String,
    pub owner: Address,
    pub active: bool,
    pub open_timestamp: u64,
}

impl From<(usize, abi::Payment)> for PaymentRecord {
    fn from((id, p): (usize, abi::Payment)) -> Self {
        Self {
            id,
            sender: p.from,
            recipient: p.to,
            amount: format_ether(p.amount),
            memo: p.memo,
            timestamp: p.timestamp.saturating_to(),
            completed: p.completed,
        }
    }
}

impl From<(usize, abi::Schedule)> for ScheduledPayment {
    fn from((id, s): (usize, abi::Schedule)) -> Self {
        Self {
            id: id as u64,
            payer: s.payer,
            recipient: s.recipient,
            amount: format_ether(s.amount),
            execute_at: s.executeAt.saturating_to(),
            interval_seconds: s.intervalSeconds.saturating_to(),
            occurrences: s.occurrences.saturating_to(),
            executed_count: s.executedCount.saturating_to(),
            active: s.active,
            escrow_balance: format_ether(s.escrowBalance),
            created_at: s.createdAt.saturating_to(),
        }
    }
}

impl From<(usize, abi::BucketInfo)> for Bucket {
    fn from((id, b): (usize, abi::BucketInfo)) -> Self {
        Self {
            id: id as u64,
            assets: b.assets,
            weights: b.weights,
            leverage: b.leverage,
            owner: b.owner,
            exists: b.exists,
        }
    }
}

impl From<(usize, abi::PositionInfo)> for Position {
    fn from((id, p): (usize, abi::PositionInfo)) -> Self {
        Self {
            id: id as u64,
            bucket_id: p.bucketId,
            is_long: p.isLong,
            margin: format_ether(p.margin),
            entry_price: format_ether(p.entryPrice),
            owner: p.owner,
            active: p.active,
            open_timestamp: p.openTimestamp.saturating_to(),
        }
    }
}

/// Number the records of an array return by position.
pub(crate) fn indexed<T, R: From<(usize, T)>>(items: Vec<T>) -> Vec<R> {
    items.into_iter().enumerate().map(R::from).collect()
}

/// Shared plumbing of the three façades.
#[derive(Debug, Clone)]
pub(crate) struct ContractHandle {
    pub(crate) tx: TxBuilder,
    pub(crate) address: Address,
    pub(crate) history: TransactionHistory,
}

impl ContractHandle {
    pub(crate) fn new(tx: TxBuilder, address: Address, history: TransactionHistory) -> Self {
        Self {
            tx,
            address,
            history,
        }
    }

    /// `eth_call` and decode the return value.
    pub(crate) async fn read<C: SolCall>(&self, call: C) -> BlockchainResult<C::Return> {
        let data = self
            .tx
            .call(self.address, Bytes::from(call.abi_encode()))
            .await
            .map_err(map_contract_error)?;
        C::abi_decode_returns(&data)
            .map_err(|e| BlockchainError::Contract(format!("{}: {}", C::SIGNATURE, e)))
    }

    /// Submit a state-changing call and record it in the local history.
    pub(crate) async fn write<C: SolCall>(
        &self,
        call: C,
        value: U256,
        kind: TxKind,
        counterparty: Option<Address>,
    ) -> BlockchainResult<SentTransaction> {
        tracing::info!(
            contract = %self.address,
            function = C::SIGNATURE,
            value = %format_ether(value),
            "Submitting contract call"
        );

        let sent = self
            .tx
            .send(self.address, value, Bytes::from(call.abi_encode()), kind)
            .await
            .map_err(map_contract_error)?;

        let record = TxRecord::new(
            sent.hash.to_string(),
            kind,
            format_ether(value),
            counterparty.map(|a| a.to_checksum(None)),
            TxStatus::Confirmed,
        );
        if let Err(e) = self.history.record(record) {
            tracing::warn!(tx_hash = %sent.hash, error = %e, "Failed to record transaction history");
        }

        Ok(sent)
    }
}

/// Turn known contract failures into user-facing errors.
pub fn map_contract_error(error: BlockchainError) -> BlockchainError {
    let message = match &error {
        BlockchainError::Rpc(m) | BlockchainError::Reverted(m) => m.clone(),
        _ => return error,
    };

    if message.contains("InvalidLeverage") {
        return BlockchainError::Validation("Invalid leverage value (must be 1-150x)".to_string());
    }
    if message.contains("InvalidWeights") {
        return BlockchainError::Validation(
            "Invalid asset weights (must sum to 100)".to_string(),
        );
    }
    if message.to_lowercase().contains("insufficient funds") {
        return BlockchainError::InsufficientBalance {
            available: "unknown".to_string(),
            required: "more than available".to_string(),
        };
    }
    error
}

/// Reject zero amounts before anything is estimated.
pub(crate) fn ensure_positive(amount: U256, what: &str) -> BlockchainResult<()> {
    if amount.is_zero() {
        return Err(BlockchainError::InvalidAmount(format!(
            "{} must be greater than zero",
            what
        )));
    }
    Ok(())
}
