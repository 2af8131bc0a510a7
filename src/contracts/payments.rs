//! Instant payments façade (CrescaPayments).

use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::blockchain::transaction::{SentTransaction, TxBuilder};
use crate::blockchain::types::{format_ether, BlockchainError, BlockchainResult};
use crate::contracts::abi::ICrescaPayments;
use crate::contracts::{ensure_positive, indexed, ContractHandle, PaymentRecord};
use crate::storage::{TransactionHistory, TxKind};

/// Longest memo the contract accepts.
pub const MAX_MEMO_CHARS: usize = 200;

/// Number of payments a user sent and received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentCount {
    pub sent: u64,
    pub received: u64,
}

/// Total value a user sent and received, in ether units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentVolume {
    pub sent: String,
    pub received: String,
}

/// Façade over the instant payments contract.
#[derive(Debug, Clone)]
pub struct PaymentsContract {
    inner: ContractHandle,
}

impl PaymentsContract {
    pub fn new(tx: TxBuilder, address: Address, history: TransactionHistory) -> Self {
        Self {
            inner: ContractHandle::new(tx, address, history),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    /// Send `amount` wei to `to` with a memo of at most 200 characters.
    pub async fn send_payment(
        &self,
        to: Address,
        amount: U256,
        memo: &str,
    ) -> BlockchainResult<SentTransaction> {
        ensure_positive(amount, "Payment amount")?;
        let memo = validate_memo(memo)?;

        let call = ICrescaPayments::sendPaymentCall {
            to,
            memo: memo.to_string(),
        };
        self.inner
            .write(call, amount, TxKind::Payment, Some(to))
            .await
    }

    /// Memo-less instant payment.
    pub async fn tap_to_pay(&self, to: Address, amount: U256) -> BlockchainResult<SentTransaction> {
        ensure_positive(amount, "Payment amount")?;
        let call = ICrescaPayments::tapToPayCall { to };
        self.inner
            .write(call, amount, TxKind::TapToPay, Some(to))
            .await
    }

    /// Pay several recipients in one transaction; the value sent is the sum.
    pub async fn batch_send(
        &self,
        recipients: &[Address],
        amounts: &[U256],
    ) -> BlockchainResult<SentTransaction> {
        if recipients.is_empty() {
            return Err(BlockchainError::Validation(
                "At least one recipient is required".to_string(),
            ));
        }
        if recipients.len() != amounts.len() {
            return Err(BlockchainError::Validation(
                "Recipient and amount arrays must have the same length".to_string(),
            ));
        }

        let mut total = U256::ZERO;
        for amount in amounts {
            ensure_positive(*amount, "Payment amount")?;
            total = total
                .checked_add(*amount)
                .ok_or_else(|| BlockchainError::InvalidAmount("Batch total overflows".to_string()))?;
        }

        let call = ICrescaPayments::batchSendCall {
            recipients: recipients.to_vec(),
            amounts: amounts.to_vec(),
        };
        self.inner.write(call, total, TxKind::BatchSend, None).await
    }

    pub async fn sent_payments(&self, user: Address) -> BlockchainResult<Vec<PaymentRecord>> {
        let payments = self
            .inner
            .read(ICrescaPayments::getSentPaymentsCall { user })
            .await?;
        Ok(indexed(payments))
    }

    pub async fn received_payments(&self, user: Address) -> BlockchainResult<Vec<PaymentRecord>> {
        let payments = self
            .inner
            .read(ICrescaPayments::getReceivedPaymentsCall { user })
            .await?;
        Ok(indexed(payments))
    }

    /// Sent and received payments merged, newest first.
    pub async fn user_transactions(&self, user: Address) -> BlockchainResult<Vec<PaymentRecord>> {
        let (sent, received) =
            tokio::try_join!(self.sent_payments(user), self.received_payments(user))?;
        Ok(merge_newest_first(sent, received))
    }

    pub async fn payment_count(&self, user: Address) -> BlockchainResult<PaymentCount> {
        let counts = self
            .inner
            .read(ICrescaPayments::getPaymentCountCall { user })
            .await?;
        Ok(PaymentCount {
            sent: counts.sent.saturating_to(),
            received: counts.received.saturating_to(),
        })
    }

    pub async fn user_volume(&self, user: Address) -> BlockchainResult<PaymentVolume> {
        let volume = self
            .inner
            .read(ICrescaPayments::getUserVolumeCall { user })
            .await?;
        Ok(PaymentVolume {
            sent: format_ether(volume.sentVolume),
            received: format_ether(volume.receivedVolume),
        })
    }
}

/// Trim the memo and enforce the length limit.
pub fn validate_memo(memo: &str) -> BlockchainResult<&str> {
    if memo.chars().count() > MAX_MEMO_CHARS {
        return Err(BlockchainError::Validation(format!(
            "Memo too long (max {} characters)",
            MAX_MEMO_CHARS
        )));
    }
    Ok(memo.trim())
}

fn merge_newest_first(
    sent: Vec<PaymentRecord>,
    received: Vec<PaymentRecord>,
) -> Vec<PaymentRecord> {
    let mut all: Vec<PaymentRecord> = sent.into_iter().chain(received).collect();
    all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    all
}
