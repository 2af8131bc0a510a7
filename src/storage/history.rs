//! Transaction history kept in local storage.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::storage::{LocalStore, StorageResult};

/// What a recorded transaction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Send,
    Receive,
    Payment,
    TapToPay,
    BatchSend,
    ScheduleCreate,
    ScheduleExecute,
    ScheduleCancel,
    BucketCreate,
    BucketRebalance,
    CollateralDeposit,
    CollateralWithdraw,
    PositionOpen,
    PositionClose,
    /// One-time setup call of an on-chain module.
    ModuleInit,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Send => "send",
            TxKind::Receive => "receive",
            TxKind::Payment => "payment",
            TxKind::TapToPay => "tap_to_pay",
            TxKind::BatchSend => "batch_send",
            TxKind::ScheduleCreate => "schedule_create",
            TxKind::ScheduleExecute => "schedule_execute",
            TxKind::ScheduleCancel => "schedule_cancel",
            TxKind::BucketCreate => "bucket_create",
            TxKind::BucketRebalance => "bucket_rebalance",
            TxKind::CollateralDeposit => "collateral_deposit",
            TxKind::CollateralWithdraw => "collateral_withdraw",
            TxKind::PositionOpen => "position_open",
            TxKind::PositionClose => "position_close",
            TxKind::ModuleInit => "module_init",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of a recorded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// One entry in the wallet's transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: String,
    pub hash: String,
    pub kind: TxKind,
    /// Amount as a decimal string in the native token.
    pub amount: String,
    /// The other party (recipient, or sender for incoming transfers).
    pub counterparty: Option<String>,
    pub timestamp_ms: u64,
    pub status: TxStatus,
}

impl TxRecord {
    /// New record stamped with the current time.
    pub fn new(
        hash: impl Into<String>,
        kind: TxKind,
        amount: impl Into<String>,
        counterparty: Option<String>,
        status: TxStatus,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            hash: hash.into(),
            kind,
            amount: amount.into(),
            counterparty,
            timestamp_ms: now_ms(),
            status,
        }
    }
}

/// Newest-first transaction list capped at `limit` entries.
#[derive(Debug, Clone)]
pub struct TransactionHistory {
    store: Arc<LocalStore>,
    key: String,
    limit: usize,
}

impl TransactionHistory {
    pub fn new(store: Arc<LocalStore>, key: impl Into<String>, limit: usize) -> Self {
        Self {
            store,
            key: key.into(),
            limit: limit.max(1),
        }
    }

    /// All records, newest first.
    pub fn list(&self) -> StorageResult<Vec<TxRecord>> {
        Ok(self.store.get(&self.key)?.unwrap_or_default())
    }

    /// Prepend a record, dropping the oldest beyond the cap.
    pub fn record(&self, record: TxRecord) -> StorageResult<()> {
        let limit = self.limit;
        self.store.update(&self.key, |records: Option<Vec<TxRecord>>| {
            let mut records = records.unwrap_or_default();
            records.insert(0, record);
            records.truncate(limit);
            records
        })
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.store.remove(&self.key)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
